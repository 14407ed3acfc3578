//! Entity extraction from free text

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::Result;

const INDUSTRIES: &[&str] = &[
    "dentist", "dental", "restaurant", "plumber", "plumbing", "lawyer", "law firm",
    "real estate", "salon", "gym", "fitness", "hvac", "roofing", "chiropractor",
    "bakery", "cafe", "auto repair", "veterinarian", "spa", "accountant",
];

const PLATFORMS: &[&str] = &[
    "facebook", "instagram", "linkedin", "twitter", "tiktok", "youtube", "pinterest",
    "google business",
];

/// Words that open a prepositional phrase but never a place name
const NON_LOCATION_WORDS: &[&str] = &[
    "the", "a", "an", "my", "our", "your", "their", "this", "that", "next", "last",
    "order", "time", "detail", "general",
];

pub struct EntityExtractor {
    location_marker: Regex,
    location_phrase: Regex,
    timeframe: Regex,
    website: Regex,
}

impl EntityExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            location_marker: Regex::new(r"(?i)\bin\s+")?,
            location_phrase: Regex::new(
                r"(?i)^([a-z][a-z .,'-]*?)(?:\s+(?:in|for|with|next|this|on|by|within|over|during|and|to|about)\b|[.!?;]|$)",
            )?,
            timeframe: Regex::new(r"(?i)\b(\d+)\s*(day|week|month)s?\b")?,
            website: Regex::new(
                r"(?i)\b((?:https?://)?(?:www\.)?[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}(?:/\S*)?)",
            )?,
        })
    }

    /// Every entity found in `text`, keyed by field name
    pub fn extract(&self, text: &str) -> Map<String, Value> {
        let lowered = text.to_lowercase();
        let mut entities = Map::new();

        if let Some(location) = self.location(text) {
            entities.insert("location".to_string(), json!(location));
        }
        if let Some(industry) = INDUSTRIES.iter().find(|i| lowered.contains(*i)) {
            entities.insert("industry".to_string(), json!(industry));
        }
        if let Some(days) = self.timeframe_days(text) {
            entities.insert("timeframe".to_string(), json!(days));
        }
        let platforms: Vec<&str> = PLATFORMS
            .iter()
            .copied()
            .filter(|p| lowered.contains(p))
            .collect();
        if !platforms.is_empty() {
            entities.insert("platforms".to_string(), json!(platforms));
        }
        if let Some(website) = self.website(text) {
            entities.insert("website".to_string(), json!(website));
        }

        entities
    }

    fn location(&self, text: &str) -> Option<String> {
        self.location_marker.find_iter(text).find_map(|marker| {
            let caps = self.location_phrase.captures(&text[marker.end()..])?;
            let value = caps
                .get(1)?
                .as_str()
                .trim()
                .trim_end_matches([',', ' '])
                .to_string();
            let first = value.split_whitespace().next()?.to_lowercase();
            (!NON_LOCATION_WORDS.contains(&first.as_str())).then_some(value)
        })
    }

    /// "<n> day|week|month" as a day count
    fn timeframe_days(&self, text: &str) -> Option<u64> {
        let caps = self.timeframe.captures(text)?;
        let count: u64 = caps.get(1)?.as_str().parse().ok()?;
        let per_unit = match caps.get(2)?.as_str().to_lowercase().as_str() {
            "day" => 1,
            "week" => 7,
            _ => 30,
        };
        count.checked_mul(per_unit)
    }

    fn website(&self, text: &str) -> Option<String> {
        self.website.captures_iter(text).find_map(|caps| {
            let value = caps.get(1)?.as_str().trim_end_matches(['.', ',', '!', '?', ')']);
            (!value.is_empty()).then(|| value.to_string())
        })
    }
}
