//! Lenient extraction of a JSON object from model output
//!
//! Models are told to answer with bare JSON but still wrap it in code fences
//! or a sentence now and then.

use serde_json::{Deserializer, Map, Value};

/// Parse the first JSON object embedded in `text`
///
/// Reading starts at each `{` in turn and stops after one complete value, so
/// text before or after the object (braces included) is ignored.
pub fn parse_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut values = Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next()? {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    })
}
