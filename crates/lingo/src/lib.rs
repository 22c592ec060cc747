//! An embeddable internationalization engine.
//!
//! `lingo` resolves user-facing text for many concurrent users, each with an
//! independent language preference, from a corpus of translatable strings
//! loaded from YAML namespaces, mutated at runtime through the dynamic
//! store, and reconciled with a remote translation service (see the
//! companion `lingo-sync` crate).
//!
//! The moving parts:
//! - [`registry::TranslationRegistry`] — the canonical in-memory store.
//! - [`cache::TieredCache`] — bounded L1 (resolved strings) and L3
//!   (compiled templates) in front of the registry.
//! - [`resolver::Resolver`] — fallback chain, placeholder application,
//!   plural dispatch.
//! - [`namespace::NamespaceManager`] — atomic per-namespace file loading
//!   and hot reload.
//! - [`player::PlayerLanguageStore`] — per-player preferences with
//!   write-through caching.
//! - [`dynamic::DynamicStore`] — runtime-created translations with
//!   persistence and sync metadata.
//! - [`extract`] — translatable-content extraction from foreign YAML.
//! - [`api::Translator`] — the facade the host and other plugins use.

pub mod api;
pub mod cache;
pub mod config;
pub mod dynamic;
pub mod events;
pub mod extract;
pub mod host;
pub mod loader;
pub mod namespace;
pub mod player;
pub mod plural;
pub mod registry;
pub mod resolver;
pub mod template;
pub mod testing;
pub mod types;

pub use api::{ApiError, Translator};
pub use config::{ConfigError, Settings};
pub use events::{EventBus, TranslationEvent};
pub use plural::{PluralCategory, PluralSelector};
pub use registry::TranslationRegistry;
pub use resolver::{Resolver, ResolverOptions};
pub use template::CompiledTemplate;
pub use types::{Language, LanguageCode, PluralForms, Translation, TranslationOrigin};
