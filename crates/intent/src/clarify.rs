//! Follow-up questions for missing fields

/// Question asking the user for `field`
pub fn clarifying_question(field: &str) -> String {
    let known = match field {
        "location" => "Which city or area should I focus on?",
        "platforms" => "Which platforms is this for, for example Instagram or LinkedIn?",
        "audit_id" => "Which audit should the report be based on?",
        "channel" => "Should I send it by email or SMS?",
        "target" => "Who should receive it? Share an email address or phone number.",
        "timeframe" => "Over what period, for example 2 weeks or 3 months?",
        "business_name" => "What is the name of the business?",
        "industry" => "What industry is the business in?",
        "website" => "What is the business website?",
        _ => "",
    };
    if known.is_empty() {
        format!("Could you tell me the {}?", field.replace('_', " "))
    } else {
        known.to_string()
    }
}
