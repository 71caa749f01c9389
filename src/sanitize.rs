//! Validation and normalization of user-supplied names and turn data.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::config::GameRules;
use crate::error::{GameError, GameResult};
use crate::types::TurnType;

/// Pen-up marker inside drawing path data
pub const PEN_UP: i16 = i16::MIN;

/// Validated content of a played turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TurnPayload {
    Drawing(DrawingPayload),
    Text(TextPayload),
}

/// A drawing: little-endian i16 x/y pairs, with `PEN_UP` separating strokes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingPayload {
    pub width: u32,
    pub height: u32,
    #[serde(with = "base64_bytes")]
    pub path_data: Vec<u8>,
}

impl DrawingPayload {
    /// Decoded coordinate stream
    pub fn points(&self) -> impl Iterator<Item = i16> + '_ {
        self.path_data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

/// Drawing as submitted by the client canvas
#[derive(Debug, Deserialize)]
struct RawDrawing {
    width: i64,
    height: i64,
    data: String,
}

/// Trim and truncate a display name
pub fn display_name(raw: &str, rules: &GameRules) -> GameResult<String> {
    let name: String = raw.trim().chars().take(rules.max_name_length).collect();
    let name = name.trim_end().to_string();
    if name.is_empty() {
        return Err(GameError::invalid("Name must not be empty"));
    }
    Ok(name)
}

/// Validate raw turn data for a turn of the given type
pub fn turn_payload(turn_type: TurnType, raw: &str, rules: &GameRules) -> GameResult<TurnPayload> {
    match turn_type {
        TurnType::Describe => describe(raw, rules),
        TurnType::Draw => drawing(raw, rules),
        TurnType::Skip => Err(GameError::invalid("Skip turns carry no data")),
    }
}

fn describe(raw: &str, rules: &GameRules) -> GameResult<TurnPayload> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(GameError::invalid("Description must not be empty"));
    }
    let len = text.chars().count();
    if len > rules.max_description_length {
        return Err(GameError::invalid(format!(
            "Description is {} characters, max is {}",
            len, rules.max_description_length
        )));
    }
    Ok(TurnPayload::Text(TextPayload {
        text: text.to_string(),
    }))
}

fn drawing(raw: &str, rules: &GameRules) -> GameResult<TurnPayload> {
    let parsed: RawDrawing = serde_json::from_str(raw)
        .map_err(|e| GameError::invalid(format!("Invalid drawing data: {}", e)))?;

    let max = i64::from(rules.max_image_size);
    for (label, value) in [("width", parsed.width), ("height", parsed.height)] {
        if value < 1 || value > max {
            return Err(GameError::invalid(format!(
                "Drawing {} {} is outside 1..={}",
                label, value, max
            )));
        }
    }

    let path_data = STANDARD
        .decode(parsed.data.as_bytes())
        .map_err(|e| GameError::invalid(format!("Drawing data is not valid base64: {}", e)))?;

    if path_data.len() % 2 != 0 {
        return Err(GameError::invalid("Drawing data has an odd byte length"));
    }
    if path_data.len() > rules.max_drawing_bytes {
        return Err(GameError::invalid(format!(
            "Drawing data is {} bytes, max is {}",
            path_data.len(),
            rules.max_drawing_bytes
        )));
    }

    Ok(TurnPayload::Drawing(DrawingPayload {
        // Bounds checked above
        width: parsed.width as u32,
        height: parsed.height as u32,
        path_data,
    }))
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_drawing(width: i64, height: i64, points: &[i16]) -> String {
        let bytes: Vec<u8> = points.iter().flat_map(|p| p.to_le_bytes()).collect();
        serde_json::json!({
            "width": width,
            "height": height,
            "data": STANDARD.encode(bytes),
        })
        .to_string()
    }

    #[test]
    fn test_display_name_trims_and_truncates() {
        let rules = GameRules {
            max_name_length: 5,
            ..GameRules::default()
        };
        assert_eq!(display_name("  Alice  ", &rules).unwrap(), "Alice");
        assert_eq!(display_name("Bartholomew", &rules).unwrap(), "Barth");
        assert_eq!(display_name("Jo  Ann", &rules).unwrap(), "Jo  A");
        assert_eq!(display_name("ab   cd", &rules).unwrap(), "ab");
    }

    #[test]
    fn test_display_name_rejects_blank() {
        let err = display_name("   ", &GameRules::default()).unwrap_err();
        assert!(matches!(err, GameError::InvalidInput(_)));
    }

    #[test]
    fn test_description_accepted() {
        let payload = turn_payload(TurnType::Describe, "  cat ", &GameRules::default()).unwrap();
        assert_eq!(
            payload,
            TurnPayload::Text(TextPayload {
                text: "cat".to_string()
            })
        );
    }

    #[test]
    fn test_description_too_long() {
        let rules = GameRules::default();
        let long = "x".repeat(rules.max_description_length + 1);
        assert!(matches!(
            turn_payload(TurnType::Describe, &long, &rules),
            Err(GameError::InvalidInput(_))
        ));
        // Counted in characters, not bytes
        let wide = "é".repeat(rules.max_description_length);
        assert!(turn_payload(TurnType::Describe, &wide, &rules).is_ok());
    }

    #[test]
    fn test_drawing_accepted() {
        let raw = raw_drawing(300, 200, &[10, 20, 30, 40, PEN_UP, 5, 5]);
        let payload = turn_payload(TurnType::Draw, &raw, &GameRules::default()).unwrap();
        match payload {
            TurnPayload::Drawing(drawing) => {
                assert_eq!(drawing.width, 300);
                assert_eq!(drawing.height, 200);
                let points: Vec<i16> = drawing.points().collect();
                assert_eq!(points, vec![10, 20, 30, 40, PEN_UP, 5, 5]);
            }
            other => panic!("Expected drawing, got {:?}", other),
        }
    }

    #[test]
    fn test_drawing_zero_width_rejected() {
        let raw = raw_drawing(0, 200, &[1, 1]);
        assert!(matches!(
            turn_payload(TurnType::Draw, &raw, &GameRules::default()),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_drawing_oversized_rejected() {
        let rules = GameRules::default();
        let raw = raw_drawing(i64::from(rules.max_image_size) + 1, 200, &[1, 1]);
        assert!(matches!(
            turn_payload(TurnType::Draw, &raw, &rules),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_drawing_bad_base64_rejected() {
        let raw = r#"{"width":10,"height":10,"data":"not base64!!"}"#;
        let err = turn_payload(TurnType::Draw, raw, &GameRules::default()).unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn test_drawing_bad_json_rejected() {
        assert!(matches!(
            turn_payload(TurnType::Draw, "{width: 3", &GameRules::default()),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_drawing_odd_length_rejected() {
        let odd = STANDARD.encode([1u8, 2, 3]);
        let raw = serde_json::json!({"width": 10, "height": 10, "data": odd}).to_string();
        assert!(matches!(
            turn_payload(TurnType::Draw, &raw, &GameRules::default()),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_drawing_wire_shape() {
        let drawing = TurnPayload::Drawing(DrawingPayload {
            width: 2,
            height: 3,
            path_data: vec![1, 0],
        });
        let json = serde_json::to_value(&drawing).unwrap();
        assert_eq!(json["kind"], "drawing");
        assert_eq!(json["pathData"], "AQA=");
    }
}
