//! Backend method-call translation.
//!
//! A translator is a capability: handed a symbolic call descriptor plus the
//! already-translated receiver/argument expressions, it either produces a
//! target expression node or declines. The registry tries its translators in
//! registration order and returns the first acceptance — first-match-wins is
//! a program-visible contract, so backends that shadow a builtin must
//! register ahead of it. Declining is not an error; only the caller that
//! needs a translation turns full exhaustion into a diagnostic.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::target_expr::TargetExpr;

pub mod registry;

pub use registry::{get_function_mapping, FunctionMapping};

/// Symbolic identification of a host-language call site: declaring type name
/// (None for free functions), method name, and argument count. No runtime
/// reflection is involved; a lowering step upstream produces these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallDescriptor {
    pub declaring_type: Option<String>,
    pub method: String,
    pub arity: usize,
}

impl CallDescriptor {
    /// A method called on an instance of `declaring_type`.
    pub fn instance(
        declaring_type: impl Into<String>,
        method: impl Into<String>,
        arity: usize,
    ) -> Self {
        Self {
            declaring_type: Some(declaring_type.into()),
            method: method.into(),
            arity,
        }
    }

    /// A free function with no receiver.
    pub fn free(method: impl Into<String>, arity: usize) -> Self {
        Self {
            declaring_type: None,
            method: method.into(),
            arity,
        }
    }
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(declaring_type) = &self.declaring_type {
            write!(f, "{}::", declaring_type)?;
        }
        write!(f, "{}/{}", self.method, self.arity)
    }
}

#[derive(Debug, Clone, Error)]
#[error("call '{0}' cannot be translated to the target query language")]
pub struct UntranslatableCallError(pub CallDescriptor);

/// One backend-supplied translation capability.
pub trait MethodCallTranslator: Send + Sync {
    /// Produce a target expression for the call, or `None` to decline.
    /// Argument-shape policy (arity, receiver presence) is checked here, not
    /// by the registry.
    fn translate(
        &self,
        receiver: Option<&Arc<TargetExpr>>,
        method: &CallDescriptor,
        args: &[Arc<TargetExpr>],
    ) -> Option<Arc<TargetExpr>>;
}

/// Ordered collection of translators. Built once per backend, never mutated
/// afterwards, and safe to share across concurrent translations.
#[derive(Default)]
pub struct TranslatorRegistry {
    translators: Vec<Box<dyn MethodCallTranslator>>,
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the builtin translators, in their documented
    /// order: the name-mapping table first, then the index-adjusting
    /// sequence translator.
    pub fn with_default_translators() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(registry::FunctionMappingTranslator));
        registry.register(Box::new(registry::ElementAtTranslator));
        registry
    }

    /// Append a translator. Registration order is the dispatch order.
    pub fn register(&mut self, translator: Box<dyn MethodCallTranslator>) {
        self.translators.push(translator);
    }

    /// Dispatch to the first translator that accepts the call. `None` means
    /// no registered translator recognizes it.
    pub fn translate(
        &self,
        receiver: Option<&Arc<TargetExpr>>,
        method: &CallDescriptor,
        args: &[Arc<TargetExpr>],
    ) -> Option<Arc<TargetExpr>> {
        for (index, translator) in self.translators.iter().enumerate() {
            if let Some(translated) = translator.translate(receiver, method, args) {
                log::debug!("translator #{} accepted call '{}'", index, method);
                return Some(translated);
            }
        }
        None
    }

    /// Like [`translate`](Self::translate), for callers that require a
    /// translation: exhaustion becomes an error naming the call.
    pub fn translate_required(
        &self,
        receiver: Option<&Arc<TargetExpr>>,
        method: &CallDescriptor,
        args: &[Arc<TargetExpr>],
    ) -> Result<Arc<TargetExpr>, UntranslatableCallError> {
        self.translate(receiver, method, args)
            .ok_or_else(|| UntranslatableCallError(method.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        accepts: &'static str,
        emits: &'static str,
        invocations: AtomicUsize,
    }

    impl Fixed {
        fn new(accepts: &'static str, emits: &'static str) -> Self {
            Self {
                accepts,
                emits,
                invocations: AtomicUsize::new(0),
            }
        }
    }

    impl MethodCallTranslator for Fixed {
        fn translate(
            &self,
            _receiver: Option<&Arc<TargetExpr>>,
            method: &CallDescriptor,
            _args: &[Arc<TargetExpr>],
        ) -> Option<Arc<TargetExpr>> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            (method.method == self.accepts).then(|| TargetExpr::function(self.emits, vec![]))
        }
    }

    impl MethodCallTranslator for Arc<Fixed> {
        fn translate(
            &self,
            receiver: Option<&Arc<TargetExpr>>,
            method: &CallDescriptor,
            args: &[Arc<TargetExpr>],
        ) -> Option<Arc<TargetExpr>> {
            self.as_ref().translate(receiver, method, args)
        }
    }

    #[test]
    fn test_dispatch_skips_decliners() {
        let mut registry = TranslatorRegistry::new();
        registry.register(Box::new(Fixed::new("other", "A")));
        registry.register(Box::new(Fixed::new("m", "B")));

        let result = registry
            .translate(None, &CallDescriptor::free("m", 0), &[])
            .unwrap();
        assert_eq!(result.to_string(), "B()");
    }

    #[test]
    fn test_first_match_wins_and_later_translators_are_not_tried() {
        let second = Arc::new(Fixed::new("m", "B"));

        let mut registry = TranslatorRegistry::new();
        registry.register(Box::new(Arc::new(Fixed::new("m", "A"))));
        registry.register(Box::new(Arc::clone(&second)));

        let result = registry
            .translate(None, &CallDescriptor::free("m", 0), &[])
            .unwrap();
        assert_eq!(result.to_string(), "A()");
        assert_eq!(second.invocations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_exhaustion_is_a_plain_none() {
        let mut registry = TranslatorRegistry::new();
        registry.register(Box::new(Fixed::new("other", "A")));
        assert!(registry
            .translate(None, &CallDescriptor::free("m", 0), &[])
            .is_none());
    }

    #[test]
    fn test_translate_required_names_the_call() {
        let registry = TranslatorRegistry::new();
        let descriptor = CallDescriptor::instance("String", "reverse", 0);
        let err = registry
            .translate_required(None, &descriptor, &[])
            .unwrap_err();
        assert!(err.to_string().contains("String::reverse/0"));
    }
}
