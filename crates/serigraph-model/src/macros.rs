//! The `props!` macro: schema prop maps as literals.

/// Build a [`Props`](crate::Props) map from `key => prop` pairs, in
/// declaration order. The sentinels mirror the schema data model: `true`
/// means "primitive, by identity", `false` means "skip", and the `"*"` key
/// (paired with `true`) covers all remaining own primitive fields.
///
/// ```
/// use serigraph_model::{props, primitive, list, object, create_simple_schema};
///
/// let sub = create_simple_schema(props! { "title" => true }).unwrap();
/// let todo = create_simple_schema(props! {
///     "title" => primitive(),
///     "internal" => false,
///     "subs" => list(object(&sub)).unwrap(),
/// })
/// .unwrap();
/// # let _ = todo;
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::Props::new()
    };
    ($($key:literal => $prop:expr),+ $(,)?) => {{
        let mut props = $crate::Props::new();
        $( props.insert($key, $prop); )+
        props
    }};
}

#[cfg(test)]
mod tests {
    use crate::props::basic::primitive;
    use crate::schema::Prop;

    #[test]
    fn test_props_macro_sentinels_and_order() {
        let props = props! {
            "title" => primitive(),
            "done" => true,
            "hidden" => false,
        };
        let names: Vec<&str> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["title", "done", "hidden"]);
        assert!(matches!(props.get("done"), Some(Prop::Primitive)));
        assert!(matches!(props.get("hidden"), Some(Prop::Skip)));
        assert!(matches!(props.get("title"), Some(Prop::Schema(_))));
    }

    #[test]
    fn test_props_macro_empty() {
        let props = props! {};
        assert!(props.is_empty());
    }
}
