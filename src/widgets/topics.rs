//! Topic picker shown before the chat opens.

pub const HEALTH_TOPICS: [&str; 5] = [
    "General Wellness",
    "Skin Health",
    "Nutrition & Diet",
    "Fitness & Exercise",
    "Mental Well-being",
];

/// Opening model message for a chat, optionally focused on a topic.
pub fn greeting(topic: Option<&str>) -> String {
    match topic.map(str::trim).filter(|t| !t.is_empty()) {
        Some(topic) => format!(
            "Hello! Let's talk about {topic}. What would you like to know? You can also attach an image."
        ),
        None => "Hello! I'm your wellness assistant. How can I help you today? You can also attach an image."
            .to_string(),
    }
}
