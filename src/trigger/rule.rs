//! Declarations of trigger rules.

use derivative::Derivative;
use regex::Regex;

use crate::{
    classes::{
        signature::{ClassName, MethodSignature},
        ClassHierarchy,
    },
    decision::{AlternativeKind, DecisionAlternative},
    error::Error,
};

/// The resolution events a rule reacts to.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum TriggerEvent {
    /// The reference was assumed null.
    OnNull,

    /// The reference was assumed to alias an existing object.
    OnAlias,

    /// The reference was assumed to denote a fresh object.
    OnExpansion,

    /// Any of the above.
    Any,
}

impl TriggerEvent {
    #[must_use]
    pub fn matches(self, kind: AlternativeKind) -> bool {
        matches!(
            (self, kind),
            (Self::OnNull, AlternativeKind::Null)
                | (Self::OnAlias, AlternativeKind::Aliases)
                | (Self::OnExpansion, AlternativeKind::Expands)
                | (
                    Self::Any,
                    AlternativeKind::Null | AlternativeKind::Aliases | AlternativeKind::Expands
                )
        )
    }
}

/// A rule of the form "when a reference read from a location matching
/// `origin` is resolved by `event`, run `method`".
///
/// The method must be static and take either no parameters or a single
/// reference, which receives the object the reference was bound to (null for
/// [`TriggerEvent::OnNull`]).
#[derive(Clone, Debug, Derivative)]
#[derivative(Eq, PartialEq)]
pub struct TriggerRule {
    event: TriggerEvent,

    /// The source of `origin`, which is what rules compare by.
    pattern: String,

    #[derivative(PartialEq = "ignore")]
    origin: Regex,

    /// When set, the reference must have been read from a location of
    /// exactly this declared type.
    static_type: Option<ClassName>,

    /// When set, an expansion or alias must bind an object of a subtype of
    /// this class.
    target_class: Option<ClassName>,

    method: MethodSignature,
}

impl TriggerRule {
    /// Creates a rule that runs `method` whenever a reference whose origin
    /// matches the regular expression `pattern` is resolved by `event`.
    ///
    /// The pattern is matched against the whole rendered origin, such as
    /// `{ROOT}:this.next`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `pattern` is not a valid regular expression.
    pub fn new(
        event: TriggerEvent,
        pattern: impl Into<String>,
        method: MethodSignature,
    ) -> Result<Self, Error> {
        let pattern = pattern.into();
        let origin = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| Error::other(format!("Invalid trigger pattern {pattern}: {e}")))?;
        Ok(Self {
            event,
            pattern,
            origin,
            static_type: None,
            target_class: None,
            method,
        })
    }

    /// Restricts the rule to references read from locations declared with
    /// type `class`.
    #[must_use]
    pub fn with_static_type(mut self, class: impl Into<ClassName>) -> Self {
        self.static_type = Some(class.into());
        self
    }

    /// Restricts the rule to bindings of objects of subtypes of `class`.
    #[must_use]
    pub fn with_target_class(mut self, class: impl Into<ClassName>) -> Self {
        self.target_class = Some(class.into());
        self
    }

    #[must_use]
    pub fn event(&self) -> TriggerEvent {
        self.event
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn method(&self) -> &MethodSignature {
        &self.method
    }

    /// Checks whether the rule fires when `alternative` is taken.
    ///
    /// `bound_class` is the class of the object the alternative binds the
    /// reference to, if it binds one.
    pub fn fires_on(
        &self,
        alternative: &DecisionAlternative,
        bound_class: Option<&ClassName>,
        classes: &dyn ClassHierarchy,
    ) -> bool {
        let Some(reference) = alternative.reference() else {
            return false;
        };
        if !self.event.matches(alternative.kind()) {
            return false;
        }
        if self
            .static_type
            .as_ref()
            .is_some_and(|ty| ty != &reference.static_type)
        {
            return false;
        }
        if let Some(target) = &self.target_class {
            match bound_class {
                Some(bound) if classes.is_subclass(bound, target) => {}
                _ => return false,
            }
        }
        self.origin.is_match(&reference.origin.to_string())
    }
}

/// The rules known to a trigger manager, in declaration order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TriggerRules {
    rules: Vec<TriggerRule>,
}

impl TriggerRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `rule` after all the rules declared so far.
    pub fn add(&mut self, rule: TriggerRule) {
        self.rules.push(rule);
    }

    /// Declares `rule`, returning the rule set.
    #[must_use]
    pub fn with(mut self, rule: TriggerRule) -> Self {
        self.add(rule);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates over the rules in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TriggerRule> {
        self.rules.iter()
    }
}
