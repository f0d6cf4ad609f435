//! Small health utilities offered next to the chat: BMI calculation, an
//! in-memory calorie log, and the topic picker.

pub mod bmi;
pub mod calories;
pub mod topics;
