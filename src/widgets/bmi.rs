//! Body-mass index from metric height and weight.

/// Adult BMI bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obesity,
}

impl BmiCategory {
    pub fn for_value(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 24.9 {
            BmiCategory::Normal
        } else if bmi < 29.9 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obesity
        }
    }

    /// Display name, as returned by `/api/bmi`.
    pub fn label(self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Normal => "Normal weight",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obesity => "Obesity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BmiReading {
    pub value: f64,
    pub category: BmiCategory,
}

impl BmiReading {
    /// Value rounded to one decimal place, as displayed.
    pub fn rounded(&self) -> f64 {
        (self.value * 10.0).round() / 10.0
    }
}

/// `weight / (height in metres)^2`. `None` unless both inputs are finite and
/// strictly positive.
pub fn calculate(height_cm: f64, weight_kg: f64) -> Option<BmiReading> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(height_cm) || !valid(weight_kg) {
        return None;
    }
    let metres = height_cm / 100.0;
    let value = weight_kg / (metres * metres);
    Some(BmiReading { value, category: BmiCategory::for_value(value) })
}
