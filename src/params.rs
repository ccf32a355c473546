//! Parsing of `<field_id>--<param>=<value>` filter tokens.

use std::str::FromStr;

use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::errors::*;
use crate::meta::*;

lazy_static! {
    static ref URL_PREFIX: Regex = Regex::new(r"^.*\?").unwrap();
    static ref URL_FRAGMENT: Regex = Regex::new(r"#.*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Min,
    Max,
    Inv,
    Keys,
}

impl Param {
    /// The parameters that can be applied to fields of `field_type`.
    pub fn allowed_for(field_type: FieldType) -> &'static [Param] {
        use Param::*;
        match field_type {
            FieldType::Variable => &[Min, Max, Inv],
            FieldType::Category => &[Keys, Inv],
            FieldType::Identifier | FieldType::MultiArray => &[],
        }
    }
}

impl FromStr for Param {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        use Param::*;
        match s {
            "Min" => Ok(Min),
            "Max" => Ok(Max),
            "Inv" => Ok(Inv),
            "Keys" => Ok(Keys),
            _ => Err(Error::Parse {
                string: s.to_owned(),
                context: "filter parameter".to_owned(),
                reason: "expected one of Min, Max, Inv or Keys",
            }),
        }
    }
}

/// Whether a flag such as `Inv` is set. Any non-empty value sets it, including `0` and `false`.
pub fn is_truthy(value: &str) -> bool {
    !value.is_empty()
}

pub type FieldParams = FxHashMap<Param, String>;

/// Requested parameters per field, in the order the fields were first named.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams {
    fields: Vec<(String, FieldParams)>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `param` for `field_id`, replacing an earlier value of the same parameter.
    pub fn insert(&mut self, field_id: &str, param: Param, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter().position(|(id, _)| id == field_id) {
            Some(pos) => {
                self.fields[pos].1.insert(param, value);
            }
            None => {
                let mut params = FieldParams::default();
                params.insert(param, value);
                self.fields.push((field_id.to_owned(), params));
            }
        }
    }

    pub fn get(&self, field_id: &str) -> Option<&FieldParams> {
        self.fields
            .iter()
            .find(|(id, _)| id == field_id)
            .map(|(_, params)| params)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldParams)> {
        self.fields.iter().map(|(id, params)| (id.as_str(), params))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Split a URL (or just its query part) into filter tokens.
///
/// Everything up to the last `?` and from the first `#` is dropped, the rest is
/// percent-decoded and split on `&`.
pub fn query_string_tokens(query: &str) -> Vec<String> {
    let query = URL_PREFIX.replace(query, "");
    let query = URL_FRAGMENT.replace(&query, "");
    percent_decode_str(&query)
        .decode_utf8_lossy()
        .split('&')
        .map(str::to_owned)
        .collect()
}

/// Parse and check one token against the dataset.
pub fn parse_token(token: &str, meta: &Metadata) -> Result<(String, Param, String)> {
    let parse_err = |reason| Error::Parse {
        string: token.to_owned(),
        context: "filter parameter".to_owned(),
        reason,
    };

    let [key, value] = token.split('=').collect::<Vec<_>>()[..] else {
        return Err(parse_err("expected a single <field>--<param>=<value> pair"));
    };
    let [field_id, param] = key.split("--").collect::<Vec<_>>()[..] else {
        return Err(parse_err("expected a single <field>--<param> key"));
    };

    let field_meta = meta
        .field_meta(field_id)
        .ok_or_else(|| Error::FieldNotFound(field_id.to_owned()))?;
    let param = Param::from_str(param)?;
    let allowed: &[Param] = match field_meta.field_type() {
        Some(Ok(field_type)) => Param::allowed_for(field_type),
        _ => &[],
    };
    if !allowed.contains(&param) {
        return Err(parse_err("parameter is not valid for this field"));
    }

    Ok((field_id.to_owned(), param, value.to_owned()))
}

/// Collect the filter parameters from explicit tokens and an optional URL query string.
///
/// Tokens that cannot be used are reported and skipped.
pub fn parse_params(
    tokens: &[String],
    query_string: Option<&str>,
    meta: &Metadata,
) -> FilterParams {
    let mut all = tokens.to_vec();
    if let Some(query) = query_string {
        all.extend(query_string_tokens(query));
    }

    let mut params = FilterParams::new();
    for token in &all {
        match parse_token(token, meta) {
            Ok((field_id, param, value)) => params.insert(&field_id, param, value),
            Err(Error::FieldNotFound(field_id)) => {
                warn!("Skipping field '{field_id}', not present in dataset")
            }
            Err(e) => warn!("Skipping string '{token}': {e}"),
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> Metadata {
        serde_json::from_value(json!({
            "id": "toy",
            "records": 3,
            "fields": [
                {"id": "identifiers", "type": "identifier"},
                {"id": "length", "type": "variable"},
                {"id": "phylum", "type": "category"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_tokens_accumulate_per_field() {
        let tokens = ["length--Min=5", "length--Max=8", "phylum--Keys=a,c", "length--Min=6"]
            .map(String::from);
        let params = parse_params(&tokens, None, &meta());

        assert_eq!(params.len(), 2);
        let length = params.get("length").unwrap();
        assert_eq!(length[&Param::Min], "6");
        assert_eq!(length[&Param::Max], "8");
        assert_eq!(params.get("phylum").unwrap()[&Param::Keys], "a,c");
        assert_eq!(
            params.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            vec!["length", "phylum"]
        );
    }

    #[test]
    fn test_invalid_tokens_are_dropped() {
        let tokens = [
            "length--Min",
            "length--Min=1=2",
            "length-Min=1",
            "length--Min--Max=1",
            "gc--Min=1",
            "length--Keys=a",
            "phylum--Max=3",
            "identifiers--Inv=1",
            "length--Between=1",
        ]
        .map(String::from);
        let params = parse_params(&tokens, None, &meta());
        assert!(params.is_empty());

        assert!(matches!(
            parse_token("gc--Min=1", &meta()),
            Err(Error::FieldNotFound(_))
        ));
        assert!(matches!(
            parse_token("length--Keys=a", &meta()),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_query_string_is_trimmed_and_decoded() {
        let url = "http://viewer/view/ds1/dataset/ds1/blob?length--Min=5&phylum--Keys=a%2Cc#Filters";
        assert_eq!(
            query_string_tokens(url),
            vec!["length--Min=5", "phylum--Keys=a,c"]
        );

        let params = parse_params(&["length--Max=8".to_owned()], Some(url), &meta());
        assert_eq!(params.get("length").unwrap().len(), 2);
        assert_eq!(params.get("phylum").unwrap()[&Param::Keys], "a,c");
    }

    #[test]
    fn test_any_flag_value_sets_it() {
        for value in ["1", "true", "0", "false", "no"] {
            assert!(is_truthy(value), "{value}");
        }
        assert!(!is_truthy(""));
    }
}
