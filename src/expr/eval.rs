//! Tree-walking evaluator.
//!
//! Evaluation never fails: type mismatches degrade to `Null`, `NaN`, an empty
//! list or `false`.

use super::parser::{BinaryOp, Direction, Func, Node, UnaryOp};
use super::value::{Counter, Value};
use crate::document::{LEMMA, TAG, is_instance_of};
use std::cmp::Ordering;

pub(crate) fn eval<'d>(node: &Node, input: &Value<'d>) -> Value<'d> {
    match node {
        Node::Null => Value::Null,
        Node::Bool(b) => Value::Bool(*b),
        Node::Number(n) => Value::Number(*n),
        Node::Str(s) => Value::Str(s.clone()),
        Node::Array(items) => Value::List(items.iter().map(|item| eval(item, input)).collect()),
        Node::Input => input.clone(),
        Node::Attribute(name) => attribute(input, name),
        Node::TagTest(tag) => Value::Bool(match input {
            Value::Span(span) => span.is_instance_of(tag),
            Value::Tag(value) => is_instance_of(value, tag),
            _ => false,
        }),
        Node::Annotations { ann_type, filter } => {
            let Some(span) = input.as_span() else {
                return Value::List(Vec::new());
            };
            let found = span
                .annotations(ann_type)
                .into_iter()
                .map(Value::Span)
                .filter(|ann| filter.as_ref().is_none_or(|f| eval(f, ann).truthy(ann)))
                .collect();
            Value::List(found)
        }
        Node::Relations { direction, rel_type, value } => {
            let Some(span) = input.as_span() else {
                return Value::List(Vec::new());
            };
            let rel_type = (!rel_type.is_empty()).then_some(rel_type.as_str());
            let edges = match direction {
                Direction::Outgoing => span.outgoing(rel_type),
                Direction::Incoming => span.incoming(rel_type),
            };
            let mut out: Vec<Value<'d>> = Vec::new();
            for (relation, end) in edges {
                if value.as_ref().is_some_and(|v| *v != relation.value) {
                    continue;
                }
                let end = Value::Span(end);
                if !out.contains(&end) {
                    out.push(end);
                }
            }
            Value::List(out)
        }
        Node::Lexicon(lexicon) => Value::Lexicon(lexicon.clone()),
        Node::Regex { regex, .. } => Value::Bool(input.text().is_some_and(|text| regex.is_match(&text))),
        Node::Subst { regex, replacement, flags, .. } => match input.text() {
            Some(text) if flags.contains('g') => {
                Value::Str(regex.replace_all(&text, replacement.as_str()).into_owned())
            }
            Some(text) => Value::Str(regex.replace(&text, replacement.as_str()).into_owned()),
            None => Value::Null,
        },
        Node::Look { look, node } => {
            let offset = if look.is_behind() { -1 } else { 1 };
            let holds = input.as_span().and_then(|span| span.context(offset)).is_some_and(|neighbour| {
                let neighbour = Value::Span(neighbour);
                eval(node, &neighbour).truthy(&neighbour)
            });
            Value::Bool(holds != look.is_negated())
        }
        Node::Unary { op: UnaryOp::Not, node } => Value::Bool(!eval(node, input).truthy(input)),
        Node::Unary { op: UnaryOp::Neg, node } => Value::Number(-eval(node, input).numeric_reading()),
        Node::Binary { op, left, right } => binary(*op, left, right, input),
        Node::Index { node, index } => {
            let target = eval(node, input);
            index_value(target, eval(index, input).numeric_reading())
        }
        Node::Slice { node, start, end } => {
            let target = eval(node, input);
            let start = start.as_ref().map(|n| eval(n, input).numeric_reading());
            let end = end.as_ref().map(|n| eval(n, input).numeric_reading());
            slice_value(target, start, end)
        }
        Node::Call { func, args } => call(*func, args, input),
    }
}

fn attribute<'d>(input: &Value<'d>, name: &str) -> Value<'d> {
    match input {
        Value::Span(span) => match name {
            LEMMA => Value::Str(span.lemma()),
            TAG => span.tag().map_or(Value::Null, |tag| Value::Tag(tag.to_string())),
            _ => span.attribute(name).map_or(Value::Null, Value::from),
        },
        Value::List(items) => Value::List(items.iter().map(|item| attribute(item, name)).collect()),
        _ => Value::Null,
    }
}

fn binary<'d>(op: BinaryOp, left: &Node, right: &Node, input: &Value<'d>) -> Value<'d> {
    let operands = || (eval(left, input), eval(right, input));
    let ordered = |accept: fn(Ordering) -> bool| {
        let (a, b) = operands();
        Value::Bool(a.compare(&b).is_some_and(accept))
    };
    match op {
        BinaryOp::Pipe => eval(right, &eval(left, input)),
        BinaryOp::Or => Value::Bool(eval(left, input).truthy(input) || eval(right, input).truthy(input)),
        BinaryOp::And => Value::Bool(eval(left, input).truthy(input) && eval(right, input).truthy(input)),
        BinaryOp::Eq => {
            let (a, b) = operands();
            Value::Bool(a.loose_eq(&b))
        }
        BinaryOp::Ne => {
            let (a, b) = operands();
            Value::Bool(!a.loose_eq(&b))
        }
        BinaryOp::Lt => ordered(Ordering::is_lt),
        BinaryOp::Le => ordered(Ordering::is_le),
        BinaryOp::Gt => ordered(Ordering::is_gt),
        BinaryOp::Ge => ordered(Ordering::is_ge),
        BinaryOp::In => {
            let (needle, haystack) = operands();
            Value::Bool(contains(&haystack, &needle))
        }
        BinaryOp::Add => {
            let (a, b) = operands();
            add(a, b)
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            let (a, b) = operands();
            let (x, y) = (a.numeric_reading(), b.numeric_reading());
            Value::Number(match op {
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                _ if y == 0.0 => f64::NAN,
                _ => x / y,
            })
        }
    }
}

fn contains(haystack: &Value<'_>, needle: &Value<'_>) -> bool {
    match haystack {
        Value::List(items) => items.iter().any(|item| item.loose_eq(needle)),
        Value::Lexicon(lexicon) => match needle {
            Value::Span(span) => lexicon.contains_span(span),
            other => other.text().is_some_and(|text| lexicon.contains(&text)),
        },
        Value::Counter(counter) => needle.text().is_some_and(|key| counter.contains(&key)),
        other if other.is_textual() => match (other.text(), needle.text()) {
            (Some(text), Some(part)) => text.contains(&part),
            _ => false,
        },
        _ => false,
    }
}

fn add<'d>(a: Value<'d>, b: Value<'d>) -> Value<'d> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Value::Number(x + y),
        (Value::List(mut items), other) => {
            items.extend(other.into_list());
            Value::List(items)
        }
        (other, Value::List(items)) => {
            let mut out = other.into_list();
            out.extend(items);
            Value::List(out)
        }
        (a, b) if a.is_textual() || b.is_textual() => {
            Value::Str(format!("{}{}", a.text().unwrap_or_default(), b.text().unwrap_or_default()))
        }
        (a, b) => Value::Number(a.numeric_reading() + b.numeric_reading()),
    }
}

/// Resolve a possibly negative index against `len`.
fn resolve_index(index: f64, len: usize) -> Option<usize> {
    if !index.is_finite() {
        return None;
    }
    let index = index.trunc() as i64;
    let index = if index < 0 { len as i64 + index } else { index };
    (0..len as i64).contains(&index).then_some(index as usize)
}

fn index_value(target: Value<'_>, index: f64) -> Value<'_> {
    match target {
        Value::List(mut items) => resolve_index(index, items.len()).map_or(Value::Null, |i| items.swap_remove(i)),
        Value::Span(span) => {
            let len = span.text().chars().count();
            resolve_index(index, len).map_or(Value::Null, |i| Value::Span(span.substring(i, i + 1)))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            resolve_index(index, chars.len()).map_or(Value::Null, |i| Value::Str(chars[i].to_string()))
        }
        _ => Value::Null,
    }
}

fn slice_bounds(start: Option<f64>, end: Option<f64>, len: usize) -> (usize, usize) {
    let clamp = |bound: f64| {
        if bound.is_nan() {
            return 0;
        }
        let bound = bound.trunc();
        let bound = if bound < 0.0 { len as f64 + bound } else { bound };
        bound.clamp(0.0, len as f64) as usize
    };
    let start = start.map_or(0, clamp);
    let end = end.map_or(len, clamp);
    (start, end.max(start))
}

fn slice_value(target: Value<'_>, start: Option<f64>, end: Option<f64>) -> Value<'_> {
    match target {
        Value::List(items) => {
            let (s, e) = slice_bounds(start, end, items.len());
            Value::List(items.into_iter().skip(s).take(e - s).collect())
        }
        Value::Span(span) => {
            let (s, e) = slice_bounds(start, end, span.text().chars().count());
            Value::Span(span.substring(s, e))
        }
        Value::Str(text) => {
            let (s, e) = slice_bounds(start, end, text.chars().count());
            Value::Str(text.chars().skip(s).take(e - s).collect())
        }
        _ => Value::Null,
    }
}

/// Apply `f` to a scalar, or to every element of a (nested) list.
fn map_scalar<'d>(value: Value<'d>, f: &dyn Fn(Value<'d>) -> Value<'d>) -> Value<'d> {
    match value {
        Value::Null => Value::Null,
        Value::List(items) => Value::List(items.into_iter().map(|item| map_scalar(item, f)).collect()),
        scalar => f(scalar),
    }
}

fn map_text<'d>(value: Value<'d>, f: fn(&str) -> String) -> Value<'d> {
    map_scalar(value, &|v: Value<'d>| v.text().map_or(Value::Null, |text| Value::Str(f(&text))))
}

/// `into_list` with nested lists expanded one level.
pub(crate) fn flat_list(value: Value<'_>) -> Vec<Value<'_>> {
    value.into_list().into_iter().flat_map(Value::into_list).collect()
}

fn flatten_deep<'d>(value: Value<'d>, out: &mut Vec<Value<'d>>) {
    match value {
        Value::List(items) => items.into_iter().for_each(|item| flatten_deep(item, out)),
        Value::Null => {}
        scalar => out.push(scalar),
    }
}

/// Frequencies of the values' text; counters are merged, blank keys dropped.
pub(crate) fn string_counter(values: Vec<Value<'_>>) -> Counter {
    let mut counter = Counter::new();
    for value in values {
        match value {
            Value::Counter(inner) => counter.merge(&inner),
            other => {
                if let Some(text) = other.text() {
                    counter.increment(text, 1.0);
                }
            }
        }
    }
    counter.retain_non_blank();
    counter
}

fn call<'d>(func: Func, args: &[Node], input: &Value<'d>) -> Value<'d> {
    // unary built-ins default to the input
    let arg = |i: usize| args.get(i).map_or_else(|| input.clone(), |node| eval(node, input));
    match func {
        Func::Lower => map_text(arg(0), str::to_lowercase),
        Func::Upper => map_text(arg(0), str::to_uppercase),
        Func::Trim => map_scalar(arg(0), &|v: Value<'d>| match v {
            Value::Span(span) => Value::Span(span.trim()),
            other => other.text().map_or(Value::Null, |text| Value::Str(text.trim().to_string())),
        }),
        Func::Len => {
            let len = match arg(0) {
                Value::Null => 0,
                Value::List(items) => items.len(),
                Value::Counter(counter) => counter.len(),
                other => other.text().map_or(1, |text| text.chars().count()),
            };
            Value::Number(len as f64)
        }
        Func::Str => Value::Str(arg(0).to_string()),
        Func::Number => Value::Number(arg(0).numeric_reading()),
        Func::Lemma => map_scalar(arg(0), &|v: Value<'d>| match v {
            Value::Span(span) => Value::Str(span.lemma()),
            other => other.text().map_or(Value::Null, |text| Value::Str(text.to_lowercase())),
        }),
        Func::Tag => map_scalar(arg(0), &|v: Value<'d>| match v {
            Value::Span(span) => span.tag().map_or(Value::Null, |tag| Value::Tag(tag.to_string())),
            tag @ Value::Tag(_) => tag,
            _ => Value::Null,
        }),
        Func::Tokens => {
            let tokens = flat_list(arg(0))
                .into_iter()
                .filter_map(|v| v.as_span())
                .flat_map(|span| span.tokens())
                .map(Value::Span)
                .collect();
            Value::List(tokens)
        }
        Func::If => {
            if arg(0).truthy(input) {
                arg(1)
            } else {
                arg(2)
            }
        }
        Func::Cxt => {
            let offset = arg(1).numeric_reading();
            if !offset.is_finite() {
                return Value::Null;
            }
            let offset = offset.trunc() as isize;
            map_scalar(arg(0), &|v: Value<'d>| {
                v.as_span().and_then(|span| span.context(offset)).map_or(Value::Null, Value::Span)
            })
        }
        Func::Map | Func::Filter => {
            let items = arg(0).into_list();
            let Some(body) = args.get(1) else {
                return Value::Null;
            };
            if func == Func::Map {
                Value::List(items.iter().map(|item| eval(body, item)).collect())
            } else {
                Value::List(items.into_iter().filter(|item| eval(body, item).truthy(item)).collect())
            }
        }
        Func::Flatten => {
            let mut out = Vec::new();
            flatten_deep(arg(0), &mut out);
            Value::List(out)
        }
        Func::First => arg(0).into_list().into_iter().next().unwrap_or(Value::Null),
        Func::Last => arg(0).into_list().pop().unwrap_or(Value::Null),
        Func::Get => index_value(Value::List(arg(0).into_list()), arg(1).numeric_reading()),
        Func::Count => Value::Counter(string_counter(flat_list(arg(0)))),
        Func::Join => {
            let sep = args.get(1).map_or_else(|| " ".to_string(), |node| eval(node, input).to_string());
            let parts: Vec<String> = flat_list(arg(0)).iter().filter_map(Value::text).collect();
            Value::Str(parts.join(&sep))
        }
        Func::Feature => {
            let prefix = arg(0).to_string();
            let names = flat_list(arg(1))
                .iter()
                .filter_map(Value::text)
                .filter(|text| !text.trim().is_empty())
                .map(|text| Value::Str(format!("{prefix}={text}")))
                .collect();
            Value::List(names)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Registry;
    use crate::expr::parser::parse;
    use crate::{Document, WordList};

    fn doc() -> Document {
        Document::from_tagged("d", "John/NNP met/VBD/meet Sally/NNP by/IN the/DT seashore/NN")
    }

    fn run<'d>(src: &str, input: &Value<'d>) -> Value<'d> {
        let registry = Registry::new().with_lexicon("names", WordList::new(["john", "sally"]));
        let node = parse(src, &registry).unwrap();
        eval(&node, input)
    }

    fn token(doc: &Document, i: usize) -> Value<'_> {
        Value::Span(doc.token(i).unwrap())
    }

    #[test]
    fn attributes_and_tags() {
        let doc = doc();
        assert_eq!(run("$LEMMA", &token(&doc, 1)), Value::Str("meet".into()));
        assert_eq!(run("$TAG", &token(&doc, 0)), Value::Tag("NNP".into()));
        assert_eq!(run("#NOUN", &token(&doc, 0)), Value::Bool(true));
        assert_eq!(run("#VERB", &token(&doc, 0)), Value::Bool(false));
        assert_eq!(run("$MISSING", &token(&doc, 0)), Value::Null);
    }

    #[test]
    fn regex_and_substitution() {
        let doc = doc();
        assert_eq!(run("/^s/i", &token(&doc, 2)), Value::Bool(true));
        assert_eq!(run("s/e/E/g", &token(&doc, 5)), Value::Str("sEashorE".into()));
        assert_eq!(run("s/e/E/", &token(&doc, 5)), Value::Str("sEashore".into()));
        assert_eq!(run("s/e/E/", &Value::Null), Value::Null);
    }

    #[test]
    fn lookaround_reads_neighbours() {
        let doc = doc();
        assert_eq!(run("(?> #VERB)", &token(&doc, 0)), Value::Bool(true));
        assert_eq!(run("(?< #VERB)", &token(&doc, 0)), Value::Bool(false));
        assert_eq!(run("(?!< #VERB)", &token(&doc, 0)), Value::Bool(true));
        assert_eq!(run("(?< $_ == 'the')", &token(&doc, 5)), Value::Bool(true));
    }

    #[test]
    fn lexicon_membership() {
        let doc = doc();
        assert!(run("%names", &token(&doc, 0)).truthy(&token(&doc, 0)));
        assert!(!run("%names", &token(&doc, 1)).truthy(&token(&doc, 1)));
        assert_eq!(run("$_ in %names", &token(&doc, 2)), Value::Bool(true));
    }

    #[test]
    fn relations_follow_edges() {
        let mut doc = doc();
        doc.add_dependency(0, 1, "nsubj");
        doc.add_dependency(2, 1, "dobj");
        let head = token(&doc, 1);
        let children = run("@<dependency", &head);
        assert_eq!(children.into_list().len(), 2);
        let subject = run("first(@<dependency{'nsubj'})", &head);
        assert_eq!(subject.text().as_deref(), Some("John"));
        assert_eq!(run("@>dependency |> first() |> $LEMMA", &token(&doc, 0)), Value::Str("meet".into()));
        assert_eq!(run("@>", &head), Value::List(vec![]));
    }

    #[test]
    fn annotation_coverage_with_filter() {
        let mut doc = doc();
        let span = doc.token_span_range(0..1).unwrap();
        doc.create_annotation("ENTITY", span, crate::attrs! { "TYPE" => "PER" });
        let john = token(&doc, 0);
        assert_eq!(run("len(@ENTITY)", &john), Value::Number(1.0));
        assert_eq!(run("len(@ENTITY($TYPE == 'ORG'))", &john), Value::Number(0.0));
        assert_eq!(run("@ENTITY($TYPE == 'PER') |> first() |> $TYPE", &john), Value::Str("PER".into()));
    }

    #[test]
    fn arithmetic_degrades_to_nan() {
        let input = Value::Null;
        assert_eq!(run("1 + 2 * 3", &input), Value::Number(7.0));
        assert!(run("1 / 0", &input).as_double().is_nan());
        assert!(run("'x' - 1", &input).as_double().is_nan());
        assert_eq!(run("'a' + 1", &input), Value::Str("a1".into()));
        assert_eq!(run("[1] + 2", &input).into_list().len(), 2);
    }

    #[test]
    fn strings_lists_and_slices() {
        let doc = doc();
        let input = token(&doc, 5);
        assert_eq!(run("upper()", &input), Value::Str("SEASHORE".into()));
        assert_eq!(run("$_[0:3]", &input).text().as_deref(), Some("sea"));
        assert_eq!(run("$_[-1]", &input).text().as_deref(), Some("e"));
        assert_eq!(run("'abc'[5]", &input), Value::Null);
        assert_eq!(run("get(['a', 'b'], -1)", &input), Value::Str("b".into()));
        assert_eq!(run("flatten([1, [2, [3]]])", &input).into_list().len(), 3);
        assert_eq!(run("join(['a', 'b'], '-')", &input), Value::Str("a-b".into()));
        assert_eq!(run("'sea' in $_", &input), Value::Bool(true));
    }

    #[test]
    fn higher_order_functions() {
        let doc = doc();
        let all = Value::Span(doc.span(crate::Range::new(0, doc.text().len())));
        let lemmas = run("map(tokens(), lemma())", &all);
        assert_eq!(lemmas.to_string(), "[john, meet, sally, by, the, seashore]");
        let nouns = run("filter(tokens(), #NOUN)", &all);
        assert_eq!(nouns.into_list().len(), 3);
        assert_eq!(run("cxt($_, 1)", &token(&doc, 0)).text().as_deref(), Some("met"));
        assert_eq!(run("cxt($_, -1)", &token(&doc, 0)), Value::Null);
        assert_eq!(run("if(#NOUN, 'n', 'other')", &token(&doc, 1)), Value::Str("other".into()));
    }

    #[test]
    fn counters_and_features() {
        let doc = Document::from_whitespace("d", "a b a  ");
        let all = Value::Span(doc.span(crate::Range::new(0, doc.text().len())));
        let Value::Counter(counter) = run("count(map(tokens(), lower()))", &all) else {
            panic!("expected a counter");
        };
        assert_eq!(counter.get("a"), 2.0);
        assert_eq!(counter.len(), 2);
        assert_eq!(run("feature('w', tokens())", &all).to_string(), "[w=a, w=b, w=a]");
    }
}
