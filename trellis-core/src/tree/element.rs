//! Components and Elements
//!
//! A component is the presentation function of the runtime: given props and
//! a hook [`Scope`], it returns a [`View`] describing its output and its
//! children. An [`Element`] pairs a component with its props; the parent's
//! view lists child elements and the runtime mounts or updates one instance
//! per element.
//!
//! Children are matched to existing instances by position and component
//! type. No other diffing takes place.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use crate::error::PresentationError;
use crate::scope::Scope;

/// A component type.
///
/// # Example
///
/// ```rust,ignore
/// struct Counter;
///
/// impl Component for Counter {
///     type Props = ();
///
///     fn render(&self, cx: &mut Scope<'_>, _: &()) -> Result<View, PresentationError> {
///         let (count, _set) = cx.use_state(|| 0);
///         Ok(View::text(count.to_string()))
///     }
/// }
/// ```
pub trait Component: 'static {
    type Props: PartialEq + 'static;

    /// Skip re-evaluation when the parent re-evaluates with equal props.
    ///
    /// Only `Props` take part in the comparison. A skipped instance keeps
    /// the component value it last rendered with, and keeps it for later
    /// evaluations triggered by its own state or contexts, so anything that
    /// should cause a re-evaluation belongs in `Props`.
    const MEMO: bool = false;

    /// Produce this instance's view. Must be a pure function of props,
    /// committed state and context values.
    fn render(&self, cx: &mut Scope<'_>, props: &Self::Props) -> Result<View, PresentationError>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The output of one evaluation.
#[derive(Debug, Default)]
pub struct View {
    content: Option<String>,
    children: Vec<Element>,
}

impl View {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            children: Vec::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn child(mut self, element: impl Into<Element>) -> Self {
        self.children.push(element.into());
        self
    }

    pub fn children<I>(mut self, elements: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        self.children.extend(elements.into_iter().map(Into::into));
        self
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub(crate) fn into_parts(self) -> (Option<String>, Vec<Element>) {
        (self.content, self.children)
    }
}

/// Type-erased component plus props.
trait AnyElement {
    fn component_type(&self) -> TypeId;
    fn name(&self) -> &'static str;
    fn memo(&self) -> bool;
    fn props_eq(&self, other: &dyn AnyElement) -> bool;
    fn render(&self, cx: &mut Scope<'_>) -> Result<View, PresentationError>;
    fn as_any(&self) -> &dyn Any;
}

struct Typed<C: Component> {
    component: C,
    props: C::Props,
}

impl<C: Component> AnyElement for Typed<C> {
    fn component_type(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn name(&self) -> &'static str {
        self.component.name()
    }

    fn memo(&self) -> bool {
        C::MEMO
    }

    fn props_eq(&self, other: &dyn AnyElement) -> bool {
        other
            .as_any()
            .downcast_ref::<Typed<C>>()
            .is_some_and(|other| other.props == self.props)
    }

    fn render(&self, cx: &mut Scope<'_>) -> Result<View, PresentationError> {
        self.component.render(cx, &self.props)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A component with its props, ready to be mounted.
#[derive(Clone)]
pub struct Element {
    inner: Rc<dyn AnyElement>,
}

impl Element {
    pub fn new<C: Component>(component: C, props: C::Props) -> Self {
        Self {
            inner: Rc::new(Typed { component, props }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Whether `other` would be matched to the same instance.
    pub(crate) fn same_component(&self, other: &Element) -> bool {
        self.inner.component_type() == other.inner.component_type()
    }

    /// Whether a re-evaluation may be skipped in favor of `next`. The
    /// component value of `next` is not compared.
    pub(crate) fn can_skip(&self, next: &Element) -> bool {
        next.inner.memo() && self.inner.props_eq(&*next.inner)
    }

    pub(crate) fn render(&self, cx: &mut Scope<'_>) -> Result<View, PresentationError> {
        self.inner.render(cx)
    }
}

impl<C> From<C> for Element
where
    C: Component<Props = ()>,
{
    fn from(component: C) -> Self {
        Element::new(component, ())
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Element").field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Label;

    impl Component for Label {
        type Props = String;

        fn render(&self, _: &mut Scope<'_>, props: &String) -> Result<View, PresentationError> {
            Ok(View::text(props.clone()))
        }
    }

    struct Pure;

    impl Component for Pure {
        type Props = u32;
        const MEMO: bool = true;

        fn render(&self, _: &mut Scope<'_>, _: &u32) -> Result<View, PresentationError> {
            Ok(View::empty())
        }
    }

    struct Unit;

    impl Component for Unit {
        type Props = ();

        fn render(&self, _: &mut Scope<'_>, _: &()) -> Result<View, PresentationError> {
            Ok(View::empty())
        }
    }

    #[test]
    fn elements_match_by_component_type() {
        let a = Element::new(Label, "a".into());
        let b = Element::new(Label, "b".into());
        let c = Element::new(Pure, 1);
        assert!(a.same_component(&b));
        assert!(!a.same_component(&c));
    }

    #[test]
    fn only_memo_components_skip_on_equal_props() {
        let a = Element::new(Label, "a".into());
        assert!(!a.can_skip(&Element::new(Label, "a".into())));

        let p = Element::new(Pure, 1);
        assert!(p.can_skip(&Element::new(Pure, 1)));
        assert!(!p.can_skip(&Element::new(Pure, 2)));
    }

    #[test]
    fn unit_props_components_convert_into_elements() {
        let element: Element = Unit.into();
        assert!(element.name().ends_with("Unit"));
    }

    #[test]
    fn view_builder_collects_children() {
        let view = View::text("root").child(Unit).children([Unit, Unit]);
        assert_eq!(view.content(), Some("root"));
        let (_, children) = view.into_parts();
        assert_eq!(children.len(), 3);
    }
}
