use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Ordered attribute map of one establishment.
///
/// Stored as parallel `(keys, values)`: rows parsed from the same header share
/// one `keys` allocation. Serializes as a JSON object in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fields {
    keys: Arc<[String]>,
    values: Vec<String>,
}

impl Fields {
    pub fn new(keys: Arc<[String]>, values: Vec<String>) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        Self { keys, values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.keys
            .iter()
            .position(|k| k == name)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    pub fn keys(&self) -> &Arc<[String]> {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct FieldsVisitor;

impl<'de> Visitor<'de> for FieldsVisitor {
    type Value = Fields;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of attribute values")
    }

    // Keeps the order keys are encountered in; scalar values are stringified.
    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Fields, A::Error> {
        let mut keys = Vec::with_capacity(access.size_hint().unwrap_or(0));
        let mut values = Vec::with_capacity(keys.capacity());
        while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            keys.push(key);
            values.push(value);
        }
        Ok(Fields::new(keys.into(), values))
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FieldsVisitor)
    }
}

/// One geocoded establishment (a SIRET row).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstablishmentPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub fields: Fields,
}

impl EstablishmentPoint {
    pub fn siret(&self) -> Option<&str> {
        self.fields.get(SIRET_COLUMN)
    }
}

pub const SIRET_COLUMN: &str = "SIRET";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub points: Vec<EstablishmentPoint>,
    pub columns: Arc<[String]>,
    pub is_sample_source: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsResult {
    pub columns: Arc<[String]>,
    pub is_sample_source: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Fields {
        let keys: Arc<[String]> =
            vec!["SIRET".to_string(), "Commune".to_string(), "Zeta".to_string()].into();
        Fields::new(keys, vec!["12345678900011".into(), "PARIS".into(), String::new()])
    }

    #[test]
    fn fields_serialize_in_key_order() {
        let json = serde_json::to_string(&sample_fields()).unwrap();
        assert_eq!(json, r#"{"SIRET":"12345678900011","Commune":"PARIS","Zeta":""}"#);
    }

    #[test]
    fn fields_deserialize_keeps_document_order() {
        let fields: Fields =
            serde_json::from_str(r#"{"Zeta":"z","Alpha":null,"Count":3}"#).unwrap();
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Zeta", "Alpha", "Count"]);
        assert_eq!(fields.get("Alpha"), Some(""));
        assert_eq!(fields.get("Count"), Some("3"));
        assert_eq!(fields.get("Missing"), None);
    }

    #[test]
    fn search_result_uses_camel_case() {
        let result = SearchResult {
            points: vec![],
            columns: vec!["SIRET".to_string()].into(),
            is_sample_source: true,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isSampleSource"], true);
        assert_eq!(value["columns"][0], "SIRET");
    }
}
