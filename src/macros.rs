/// Compile a regex literal once and return a `&'static Regex`.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build an attribute map for `Document::create_annotation`.
///
/// ```
/// use tokenrules::{AttrValue, attrs};
///
/// let a = attrs! { "CONFIDENCE" => 0.5, "SOURCE" => "manual" };
/// assert_eq!(a.get("CONFIDENCE"), Some(&AttrValue::Number(0.5)));
/// ```
#[macro_export]
macro_rules! attrs {
    () => { std::collections::BTreeMap::<String, $crate::AttrValue>::new() };
    ( $($name:expr => $value:expr),+ $(,)? ) => {{
        let mut map = std::collections::BTreeMap::<String, $crate::AttrValue>::new();
        $( map.insert($name.to_string(), $crate::AttrValue::from($value)); )+
        map
    }};
}
