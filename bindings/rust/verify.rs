//! Checks that a grammar descriptor can be turned into a usable language handle.

use thiserror::Error;
use tracing::{debug, warn};
use tree_sitter::ffi::TSLanguage;
use tree_sitter::{Language, LanguageError, Parser};

/// Errors raised when a grammar cannot be loaded into the host library.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The provider handed back a null descriptor.
    #[error("Error loading Metta grammar: provider returned a null language")]
    NullDescriptor,

    /// The host library rejected the descriptor's ABI version.
    #[error("Error loading Metta grammar: {0}")]
    Incompatible(#[from] LanguageError),
}

/// Something that can hand out a raw grammar descriptor.
///
/// # Safety
///
/// [`descriptor`](Self::descriptor) must return either null or a pointer to a
/// `TSLanguage` that stays valid for the rest of the program, such as the
/// static table exported by a compiled grammar.
pub unsafe trait GrammarProvider {
    fn descriptor(&self) -> *const TSLanguage;
}

/// The grammar compiled into this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metta;

// SAFETY: `tree_sitter_metta` returns the address of a static `TSLanguage`.
unsafe impl GrammarProvider for Metta {
    fn descriptor(&self) -> *const TSLanguage {
        crate::raw_language()
    }
}

/// Adapts a function returning a raw descriptor, e.g. a grammar's
/// `extern "C"` entry point or a stub in tests.
#[derive(Debug, Clone, Copy)]
pub struct FnProvider<F>(F);

impl<F> FnProvider<F>
where
    F: Fn() -> *const TSLanguage,
{
    /// # Safety
    ///
    /// Every call to `f` must return null or a pointer satisfying the
    /// [`GrammarProvider`] contract.
    pub const unsafe fn new(f: F) -> Self {
        Self(f)
    }
}

// SAFETY: upheld by the caller of `FnProvider::new`.
unsafe impl<F> GrammarProvider for FnProvider<F>
where
    F: Fn() -> *const TSLanguage,
{
    fn descriptor(&self) -> *const TSLanguage {
        (self.0)()
    }
}

/// Loads the linked Metta grammar and confirms the parser accepts it.
pub fn verify_grammar_loads() -> Result<Language, LoadError> {
    verify_with(&Metta)
}

/// Same check as [`verify_grammar_loads`], against any provider.
pub fn verify_with<P: GrammarProvider + ?Sized>(provider: &P) -> Result<Language, LoadError> {
    load(provider).map(|(language, _)| language)
}

/// A parser already configured with the linked Metta grammar.
pub fn metta_parser() -> Result<Parser, LoadError> {
    load(&Metta).map(|(_, parser)| parser)
}

fn load<P: GrammarProvider + ?Sized>(provider: &P) -> Result<(Language, Parser), LoadError> {
    let raw = provider.descriptor();
    if raw.is_null() {
        warn!("grammar provider returned a null language");
        return Err(LoadError::NullDescriptor);
    }

    // SAFETY: non-null, and `GrammarProvider` guarantees it outlives the program.
    let language = unsafe { Language::from_raw(raw) };

    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&language) {
        warn!(error = %e, "host library rejected grammar");
        return Err(e.into());
    }

    debug!(
        abi = language.version(),
        node_kinds = language.node_kind_count(),
        "grammar loaded"
    );
    Ok((language, parser))
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use super::*;

    struct Empty;

    // SAFETY: always null.
    unsafe impl GrammarProvider for Empty {
        fn descriptor(&self) -> *const TSLanguage {
            ptr::null()
        }
    }

    #[test]
    fn linked_grammar_verifies() {
        let language = verify_grammar_loads().expect("Error loading Metta grammar");
        assert_eq!(language.version(), 14);
        assert!(language.node_kind_count() > 0);
    }

    #[test]
    fn null_descriptor_is_reported_not_fatal() {
        let err = verify_with(&Empty).unwrap_err();
        assert!(matches!(err, LoadError::NullDescriptor));
        assert!(err.to_string().contains("Error loading Metta grammar"));
    }

    #[test]
    fn null_function_provider_is_rejected() {
        // SAFETY: the stub only ever returns null.
        let provider = unsafe { FnProvider::new(ptr::null::<TSLanguage>) };
        assert!(matches!(verify_with(&provider), Err(LoadError::NullDescriptor)));
    }

    #[test]
    fn repeated_verification_is_stable() {
        for _ in 0..8 {
            assert!(verify_grammar_loads().is_ok());
            assert!(verify_with(&Empty).is_err());
        }
    }

    #[test]
    fn entry_point_provider_matches_linked_grammar() {
        // SAFETY: the compiled grammar's entry point returns its static table.
        let provider = unsafe { FnProvider::new(crate::raw_language) };
        let language = verify_with(&provider).unwrap();
        let linked = crate::language();
        assert_eq!(language.node_kind_count(), linked.node_kind_count());
        assert_eq!(language.field_count(), linked.field_count());
    }

    #[test]
    fn configured_parser_parses() {
        let mut parser = metta_parser().unwrap();
        let tree = parser.parse("(= x 1)", None).unwrap();
        assert!(!tree.root_node().has_error());
    }
}
