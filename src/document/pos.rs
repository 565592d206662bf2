//! Part-of-speech hierarchy.
//!
//! Tags are compared by instance-of: a tag is an instance of itself, of its
//! universal parent (Penn `NNS` is a `NOUN`), and of the `ANY` sentinel.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Penn Treebank tag -> universal tag.
static UNIVERSAL_PARENT: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("CC", "CONJ"),
        ("CD", "NUM"),
        ("DT", "DET"),
        ("EX", "DET"),
        ("FW", "X"),
        ("IN", "ADP"),
        ("JJ", "ADJ"),
        ("JJR", "ADJ"),
        ("JJS", "ADJ"),
        ("LS", "X"),
        ("MD", "VERB"),
        ("NN", "NOUN"),
        ("NNS", "NOUN"),
        ("NNP", "NOUN"),
        ("NNPS", "NOUN"),
        ("PDT", "DET"),
        ("POS", "PRT"),
        ("PRP", "PRON"),
        ("PRP$", "PRON"),
        ("RB", "ADV"),
        ("RBR", "ADV"),
        ("RBS", "ADV"),
        ("RP", "PRT"),
        ("SYM", "X"),
        ("TO", "PRT"),
        ("UH", "X"),
        ("VB", "VERB"),
        ("VBD", "VERB"),
        ("VBG", "VERB"),
        ("VBN", "VERB"),
        ("VBP", "VERB"),
        ("VBZ", "VERB"),
        ("WDT", "DET"),
        ("WP", "PRON"),
        ("WP$", "PRON"),
        ("WRB", "ADV"),
        (".", "PUNCT"),
        (",", "PUNCT"),
        (":", "PUNCT"),
        ("``", "PUNCT"),
        ("''", "PUNCT"),
        ("-LRB-", "PUNCT"),
        ("-RRB-", "PUNCT"),
        ("HYPH", "PUNCT"),
    ])
});

/// Generic tag every tag is an instance of.
pub const ANY: &str = "ANY";

/// True when `tag` is `wanted`, a child of `wanted`, or `wanted` is [`ANY`].
pub(crate) fn is_instance_of(tag: &str, wanted: &str) -> bool {
    if wanted == ANY || tag.eq_ignore_ascii_case(wanted) {
        return true;
    }
    UNIVERSAL_PARENT.get(tag).is_some_and(|parent| parent.eq_ignore_ascii_case(wanted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn penn_tags_are_instances_of_universal_parents() {
        assert!(is_instance_of("NNS", "NOUN"));
        assert!(is_instance_of("VBD", "VERB"));
        assert!(is_instance_of("NOUN", "NOUN"));
        assert!(is_instance_of("NN", "ANY"));
        assert!(!is_instance_of("NN", "VERB"));
        assert!(!is_instance_of("NOUN", "NN"));
    }
}
