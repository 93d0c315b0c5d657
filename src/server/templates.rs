use askama::Template;
use std::collections::HashMap;

use crate::constants::FORM_FIELDS;

/// One numeric input on the prediction form
pub struct FormField {
    pub name: &'static str,
    pub label: String,
    pub value: String,
}

impl FormField {
    /// All inputs in model order, pre-filled with what the user last submitted.
    pub fn all(submitted: Option<&HashMap<String, String>>) -> Vec<FormField> {
        FORM_FIELDS
            .iter()
            .map(|&name| FormField {
                name,
                label: label_for(name),
                value: submitted
                    .and_then(|form| form.get(name))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect()
    }
}

fn label_for(name: &str) -> String {
    if name == "pH" {
        return "pH".to_string();
    }
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub fields: Vec<FormField>,
    pub prediction: Option<u8>,
    pub error: Option<String>,
}
