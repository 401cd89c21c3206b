/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

// In #[derive(DeJson)]: "this block may be rewritten with the `?` operator"
#![allow(clippy::question_mark)]

//! Subset of the engine's `extension_api.json` needed to populate the class registry.
//!
//! Fields not listed here are skipped during parsing.

use nanoserde::DeJson;

use crate::error::RegistryError;

#[derive(DeJson, Debug)]
pub struct JsonExtensionApi {
    pub header: JsonHeader,
    pub classes: Vec<JsonClass>,
}

#[derive(DeJson, Clone, Debug)]
pub struct JsonHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub version_patch: u8,
    pub version_full_name: String,
}

#[derive(DeJson, Debug)]
pub struct JsonClass {
    pub name: String,
    pub is_refcounted: bool,
    pub is_instantiable: bool,
    pub inherits: Option<String>,
    pub api_type: String,
    pub methods: Option<Vec<JsonClassMethod>>,
}

#[derive(DeJson, Clone, Debug)]
pub struct JsonClassMethod {
    pub name: String,
    pub is_const: bool,
    pub is_vararg: bool,
    pub is_static: bool,
    pub is_virtual: bool,
    pub hash: Option<i64>,
    pub return_value: Option<JsonMethodReturn>,
    pub arguments: Option<Vec<JsonMethodArg>>,
}

// Example: set_point_weight_scale ->
// [ {name: "id", type: "int", meta: "int64"},
//   {name: "weight_scale", type: "float", meta: "float"},
#[derive(DeJson, Clone, Debug)]
pub struct JsonMethodArg {
    pub name: String,
    #[nserde(rename = "type")]
    pub type_: String,
    pub meta: Option<String>,
}

#[derive(DeJson, Clone, Debug)]
pub struct JsonMethodReturn {
    #[nserde(rename = "type")]
    pub type_: String,
    pub meta: Option<String>,
}

impl JsonClassMethod {
    pub fn arg_types(&self) -> Vec<String> {
        self.arguments
            .iter()
            .flatten()
            .map(|arg| arg.type_.clone())
            .collect()
    }

    pub fn return_type(&self) -> String {
        self.return_value
            .as_ref()
            .map_or_else(|| "void".to_owned(), |ret| ret.type_.clone())
    }
}

pub fn parse_extension_api(json: &str) -> Result<JsonExtensionApi, RegistryError> {
    DeJson::deserialize_json(json).map_err(|err| RegistryError::Reflection {
        message: err.to_string(),
    })
}
