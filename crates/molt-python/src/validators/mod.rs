// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Pre-flight checks run before a refactoring edits anything.
//!
//! - [`name_conflict`]: module-level class, function and constant names
//! - [`conflict`]: exact-container method, field and class collisions
//! - [`property`]: `@property` accessor groups that move as a unit
//! - [`decorator`]: decorator terminal names and re-rendering

pub mod conflict;
pub mod decorator;
pub mod name_conflict;
pub mod property;

pub use conflict::{ClassConflictChecker, FieldConflictChecker, MethodConflictChecker};
pub use decorator::{apply_decorators, DecoratorHandler, PRESERVABLE};
pub use name_conflict::NameConflictValidator;
pub use property::{PropertyDefinition, PropertyMethodHandler};
