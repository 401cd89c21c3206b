/*
 * Copyright (c) godot-rust; Bromeon and contributors.
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::error::Error;
use std::fmt;

/// Failure while building or querying the class/method binding registry.
#[derive(Clone, Eq, PartialEq, Debug)]
#[non_exhaustive]
pub enum RegistryError {
    ClassNotFound {
        class: String,
    },
    MethodNotFound {
        class: String,
        method: String,
    },
    DuplicateClass {
        class: String,
    },
    UnknownParent {
        class: String,
        parent: String,
    },
    /// Following `parent` links from the class leads back to it.
    InheritanceCycle {
        class: String,
    },
    /// An extension class overrides a virtual method that none of its engine ancestors declares.
    UnknownVirtual {
        class: String,
        method: String,
    },
    /// An override's parameter or return types differ from the engine's declaration.
    VirtualSignatureMismatch {
        class: String,
        method: String,
        declared: String,
        provided: String,
    },
    /// A typed override targets a virtual whose types are unknown (declared by name only).
    UntypedVirtual {
        class: String,
        method: String,
        provided: String,
    },
    /// The engine has no method under this name and hash (usually an API version mismatch).
    MethodBindUnavailable {
        class: String,
        method: String,
        hash: i64,
    },
    /// `extension_api.json` could not be parsed.
    Reflection {
        message: String,
    },
    /// The class cannot be instantiated from the host (abstract, or registration was not completed).
    NotInstantiable {
        class: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassNotFound { class } => write!(f, "class `{class}` is not registered"),
            Self::MethodNotFound { class, method } => {
                write!(f, "method `{class}::{method}` is not declared by the class or its ancestors")
            }
            Self::DuplicateClass { class } => write!(f, "class `{class}` is registered twice"),
            Self::UnknownParent { class, parent } => {
                write!(f, "class `{class}` inherits from `{parent}`, which is not registered")
            }
            Self::InheritanceCycle { class } => write!(f, "class `{class}` inherits from itself"),
            Self::VirtualSignatureMismatch {
                class,
                method,
                declared,
                provided,
            } => write!(
                f,
                "class `{class}` overrides `{method}` as `{provided}`, but the engine declares `{declared}`"
            ),
            Self::UnknownVirtual { class, method } => write!(
                f,
                "class `{class}` overrides `{method}`, which is not a virtual method of any ancestor"
            ),
            Self::UntypedVirtual {
                class,
                method,
                provided,
            } => write!(
                f,
                "class `{class}` overrides `{method}` as `{provided}`, but the virtual was declared without types; \
                 declare its signature or use a raw override"
            ),
            Self::MethodBindUnavailable {
                class,
                method,
                hash,
            } => write!(
                f,
                "engine has no method bind for `{class}::{method}` (hash {hash}); make sure the API version matches the engine"
            ),
            Self::Reflection { message } => write!(f, "failed to read extension API: {message}"),
            Self::NotInstantiable { class } => write!(f, "class `{class}` cannot be instantiated"),
        }
    }
}

impl Error for RegistryError {}
