//! Rule program parser.
//!
//! Programs are line oriented. A `[name]` header opens a rule block; inside it
//! a `trigger:` section holds a token pattern (continued on following lines),
//! and any number of `annotation:` and `relation:` sections hold one
//! `key=value` property per line:
//!
//! ```text
//! // vehicles and what modifies them
//! [vehicle]
//! trigger: (?<mod> #JJ)+
//!          (?<head> %vehicles)
//! annotation: capture=head
//!   type=VEHICLE
//!   $SOURCE='lexicon'
//! relation: modified_by
//!   type=amod
//!   requires=
//!   @>{head}=$_
//!   @<{mod}=$_
//! ```
//!
//! Blank lines, `//` lines and lines starting with `# ` are ignored. A line
//! starting with `#TAG` is pattern text, not a comment.
//!
//! Parsing happens in two passes: lines are collected into drafts, then each
//! draft is compiled so that cross references (`requires`, captures) can be
//! checked against the finished rule.

use super::rule::{AnnotationProvider, Endpoint, RelationProvider, Rule};
use crate::api::Registry;
use crate::pattern::WHOLE_MATCH;
use crate::scan::Cursor;
use crate::{AttrValue, Error, Expression, KindSet, Result, TokenPattern};
use std::collections::{BTreeMap, BTreeSet};

pub(crate) fn parse(program: &str, source: &str, registry: &Registry) -> Result<Vec<Rule>> {
    let mut drafts: Vec<RuleDraft> = Vec::new();
    let mut section = Section::None;

    for (idx, raw) in program.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if text.is_empty() || is_comment(text) {
            continue;
        }

        if let Some(caps) = crate::regex!(r"^\[\s*([^\]]*?)\s*\]$").captures(text) {
            let name = caps.get(1).map_or("", |m| m.as_str());
            if !crate::regex!(r"^[A-Za-z_][A-Za-z0-9_.-]*$").is_match(name) {
                return Err(Error::program(line, format!("invalid rule name '{name}'")));
            }
            if drafts.iter().any(|d| d.name == name) {
                return Err(Error::program(line, format!("duplicate rule [{name}]")));
            }
            drafts.push(RuleDraft::new(name, line));
            section = Section::None;
            continue;
        }

        let Some(rule) = drafts.last_mut() else {
            return Err(Error::program(line, format!("'{text}' appears outside a rule block")));
        };

        if let Some(caps) = crate::regex!(r"^(trigger|annotation|relation)\s*:\s*(.*)$").captures(text) {
            let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
            section = match caps.get(1).map_or("", |m| m.as_str()) {
                "trigger" => {
                    if rule.trigger.is_some() {
                        return Err(Error::program(line, format!("rule [{}] has more than one trigger", rule.name)));
                    }
                    rule.trigger = Some((rest.to_string(), line));
                    Section::Trigger
                }
                "annotation" => {
                    let mut draft = AnnotationDraft { line, ..AnnotationDraft::default() };
                    if !rest.is_empty() {
                        draft.property(rest, line)?;
                    }
                    rule.annotations.push(draft);
                    Section::Annotation
                }
                _ => {
                    if !crate::regex!(r"^[A-Za-z_][A-Za-z0-9_.-]*$").is_match(rest) {
                        return Err(Error::program(line, format!("invalid relation name '{rest}'")));
                    }
                    if rule.relations.iter().any(|r| r.name == rest) {
                        return Err(Error::program(line, format!("duplicate relation '{rest}' in [{}]", rule.name)));
                    }
                    rule.relations.push(RelationDraft { name: rest.to_string(), line, ..RelationDraft::default() });
                    Section::Relation
                }
            };
            continue;
        }

        match section {
            Section::None => {
                return Err(Error::program(line, format!("expected trigger:, annotation: or relation:, found '{text}'")));
            }
            Section::Trigger => {
                if let Some((pattern, _)) = rule.trigger.as_mut() {
                    if !pattern.is_empty() {
                        pattern.push(' ');
                    }
                    pattern.push_str(text);
                }
            }
            Section::Annotation => {
                if let Some(draft) = rule.annotations.last_mut() {
                    draft.property(text, line)?;
                }
            }
            Section::Relation => {
                if let Some(draft) = rule.relations.last_mut() {
                    draft.property(text, line)?;
                }
            }
        }
    }

    let rules = drafts.into_iter().map(|draft| draft.compile(source, registry)).collect::<Result<Vec<_>>>()?;
    log::debug!("[program:compile] {source}: {} rule(s)", rules.len());
    Ok(rules)
}

#[derive(Debug, Clone, Copy)]
enum Section {
    None,
    Trigger,
    Annotation,
    Relation,
}

fn is_comment(text: &str) -> bool {
    text.starts_with("//") || text == "#" || text.starts_with("# ")
}

/// Split `key=value` at the first `=`.
fn split_property(text: &str, line: usize) -> Result<(&str, &str)> {
    text.split_once('=')
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| Error::program(line, format!("expected key=value, found '{text}'")))
}

fn set_once(slot: &mut Option<(String, usize)>, key: &str, value: &str, line: usize) -> Result<()> {
    if slot.is_some() {
        return Err(Error::program(line, format!("duplicate key '{key}'")));
    }
    *slot = Some((value.to_string(), line));
    Ok(())
}

fn requires_list(value: &str, line: usize) -> Vec<(String, usize)> {
    value.split(',').map(str::trim).filter(|name| !name.is_empty()).map(|name| (name.to_string(), line)).collect()
}

/// A quoted string, a number, a boolean, or bare text.
fn literal(value: &str, line: usize) -> Result<AttrValue> {
    let mut cur = Cursor::new(value);
    if matches!(cur.peek(), Some('\'' | '"')) {
        let text = cur.read_quoted().map_err(|e| Error::program(line, e.to_string()))?;
        cur.skip_whitespace();
        if !cur.is_eof() {
            return Err(Error::program(line, format!("unexpected text after quoted value: '{}'", cur.rest())));
        }
        return Ok(AttrValue::Str(text));
    }
    Ok(match value {
        "true" => AttrValue::Bool(true),
        "false" => AttrValue::Bool(false),
        _ => match value.parse::<f64>() {
            Ok(n) if n.is_finite() => AttrValue::Number(n),
            _ => AttrValue::Str(value.to_string()),
        },
    })
}

#[derive(Debug)]
struct RuleDraft {
    name: String,
    line: usize,
    trigger: Option<(String, usize)>,
    annotations: Vec<AnnotationDraft>,
    relations: Vec<RelationDraft>,
}

#[derive(Debug, Default)]
struct AnnotationDraft {
    line: usize,
    capture: Option<(String, usize)>,
    ann_type: Option<(String, usize)>,
    requires: Vec<(String, usize)>,
    attributes: BTreeMap<String, AttrValue>,
}

#[derive(Debug, Default)]
struct RelationDraft {
    name: String,
    line: usize,
    rel_type: Option<(String, usize)>,
    value: Option<(String, usize)>,
    bidirectional: Option<(String, usize)>,
    requires: Vec<(String, usize)>,
    source: Option<EndpointDraft>,
    target: Option<EndpointDraft>,
}

#[derive(Debug)]
struct EndpointDraft {
    capture: String,
    expression: String,
    line: usize,
}

impl AnnotationDraft {
    fn property(&mut self, text: &str, line: usize) -> Result<()> {
        let (key, value) = split_property(text, line)?;
        match key {
            "capture" => set_once(&mut self.capture, key, value, line),
            "type" => set_once(&mut self.ann_type, key, value, line),
            "requires" => {
                self.requires.extend(requires_list(value, line));
                Ok(())
            }
            _ => match key.strip_prefix('$') {
                Some(attr) if crate::regex!(r"^[A-Za-z_][A-Za-z0-9_]*$").is_match(attr) => {
                    if self.attributes.insert(attr.to_string(), literal(value, line)?).is_some() {
                        return Err(Error::program(line, format!("duplicate attribute '{key}'")));
                    }
                    Ok(())
                }
                _ => Err(Error::program(line, format!("unknown annotation key '{key}'"))),
            },
        }
    }
}

impl RelationDraft {
    fn property(&mut self, text: &str, line: usize) -> Result<()> {
        let (key, value) = split_property(text, line)?;
        match key {
            "type" => set_once(&mut self.rel_type, key, value, line),
            "value" => set_once(&mut self.value, key, value, line),
            "bidirectional" => set_once(&mut self.bidirectional, key, value, line),
            "requires" => {
                self.requires.extend(requires_list(value, line));
                Ok(())
            }
            _ => {
                let Some(caps) = crate::regex!(r"^(@>|@<|source|target)\s*(?:\{\s*([^}]*?)\s*\})?$").captures(key) else {
                    return Err(Error::program(line, format!("unknown relation key '{key}'")));
                };
                let capture = caps.get(2).map_or(WHOLE_MATCH, |m| m.as_str());
                let endpoint = EndpointDraft {
                    capture: if capture.is_empty() { WHOLE_MATCH } else { capture }.to_string(),
                    expression: value.to_string(),
                    line,
                };
                let slot = match caps.get(1).map_or("", |m| m.as_str()) {
                    "@>" | "source" => &mut self.source,
                    _ => &mut self.target,
                };
                if slot.is_some() {
                    return Err(Error::program(line, format!("duplicate endpoint '{key}'")));
                }
                *slot = Some(endpoint);
                Ok(())
            }
        }
    }
}

impl RuleDraft {
    fn new(name: &str, line: usize) -> Self {
        RuleDraft { name: name.to_string(), line, trigger: None, annotations: Vec::new(), relations: Vec::new() }
    }

    fn compile(self, source: &str, registry: &Registry) -> Result<Rule> {
        let (pattern, trigger_line) =
            self.trigger.ok_or_else(|| Error::program(self.line, format!("rule [{}] has no trigger", self.name)))?;
        let trigger = TokenPattern::compile_with(&pattern, registry)
            .map_err(|e| Error::program(trigger_line, format!("trigger of [{}]: {e}", self.name)))?;

        let relation_names: BTreeSet<String> = self.relations.iter().map(|r| r.name.clone()).collect();
        let check_requires = |requires: Vec<(String, usize)>| -> Result<BTreeSet<String>> {
            requires
                .into_iter()
                .map(|(name, line)| {
                    if relation_names.contains(&name) {
                        Ok(name)
                    } else {
                        Err(Error::program(line, format!("requires names undefined relation '{name}'")))
                    }
                })
                .collect()
        };
        let check_capture = |capture: String, line: usize| -> Result<String> {
            if trigger.has_group(&capture) {
                Ok(capture)
            } else {
                Err(Error::program(line, format!("undefined capture '{capture}'")))
            }
        };

        let mut annotations = Vec::with_capacity(self.annotations.len());
        for draft in self.annotations {
            let (ann_type, _) =
                draft.ann_type.ok_or_else(|| Error::program(draft.line, "annotation is missing type="))?;
            let (capture, capture_line) = draft.capture.unwrap_or_else(|| (WHOLE_MATCH.to_string(), draft.line));
            annotations.push(AnnotationProvider {
                capture: check_capture(capture, capture_line)?,
                ann_type,
                requires: check_requires(draft.requires)?,
                attributes: draft.attributes,
            });
        }

        let mut relations = Vec::with_capacity(self.relations.len());
        for draft in self.relations {
            let (rel_type, _) = draft
                .rel_type
                .ok_or_else(|| Error::program(draft.line, format!("relation '{}' is missing type=", draft.name)))?;
            let value = match draft.value {
                Some((text, line)) => match literal(&text, line)? {
                    AttrValue::Str(s) => s,
                    other => other.to_string(),
                },
                None => String::new(),
            };
            let bidirectional = match draft.bidirectional {
                None => false,
                Some((flag, line)) => match flag.as_str() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(Error::program(line, format!("bidirectional must be true or false, not '{flag}'"))),
                },
            };
            let endpoint = |draft: Option<EndpointDraft>| -> Result<Endpoint> {
                let Some(draft) = draft else {
                    return Endpoint::whole_match();
                };
                let projection = Expression::compile_with(&draft.expression, registry)
                    .map_err(|e| Error::program(draft.line, format!("endpoint expression: {e}")))?;
                if !projection.kind().is_instance(KindSet::HSPAN | KindSet::OBJECT) {
                    return Err(Error::program(
                        draft.line,
                        format!("endpoint expression {projection} yields {}, expected spans", projection.kind()),
                    ));
                }
                Ok(Endpoint { capture: check_capture(draft.capture, draft.line)?, projection })
            };
            let source = endpoint(draft.source)?;
            let target = endpoint(draft.target)?;
            relations.push(RelationProvider {
                name: draft.name,
                rel_type,
                value,
                bidirectional,
                requires: check_requires(draft.requires)?,
                source,
                target,
            });
        }

        Ok(Rule { name: self.name, source: source.to_string(), trigger, annotations, relations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(program: &str) -> Result<Vec<Rule>> {
        parse(program, "test.rules", &Registry::default())
    }

    fn error_line(program: &str) -> usize {
        match compile(program) {
            Err(Error::Program { line, .. }) => line,
            other => panic!("expected a program error, got {other:?}"),
        }
    }

    #[test]
    fn full_rule_block() {
        let rules = compile(
            "// comment\n\
             [subject]\n\
             trigger: (?<subj> #NOUN)\n\
             \x20        (?<verb> #VERB)\n\
             annotation: capture=subj\n\
             \x20 type=ACTOR\n\
             \x20 requires=nsubj\n\
             \x20 $ROLE='agent'\n\
             \x20 $WEIGHT=2\n\
             relation: nsubj\n\
             \x20 type=role\n\
             \x20 value=\"subject of\"\n\
             \x20 bidirectional=true\n\
             \x20 @>{subj}=$_\n\
             \x20 @<{verb}=$_\n",
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.provenance(), "test.rules::subject");
        assert_eq!(rule.trigger().group_names(), ["subj", "verb"]);

        let ann = &rule.annotation_providers()[0];
        assert_eq!(ann.capture, "subj");
        assert_eq!(ann.ann_type, "ACTOR");
        assert!(ann.requires.contains("nsubj"));
        assert_eq!(ann.attributes.get("ROLE"), Some(&AttrValue::Str("agent".into())));
        assert_eq!(ann.attributes.get("WEIGHT"), Some(&AttrValue::Number(2.0)));

        let rel = &rule.relation_providers()[0];
        assert_eq!((rel.name.as_str(), rel.rel_type.as_str(), rel.value.as_str()), ("nsubj", "role", "subject of"));
        assert!(rel.bidirectional);
        assert_eq!(rel.source.capture, "subj");
        assert_eq!(rel.target.capture, "verb");
        assert!(rel.source.is_identity());
    }

    #[test]
    fn defaults() {
        let rules = compile("[r]\ntrigger: 'old' 'car'\nannotation:\n  type=VEHICLE_MENTION\nrelation: x\n  type=t\n").unwrap();
        let rule = &rules[0];
        assert_eq!(rule.annotation_providers()[0].capture, WHOLE_MATCH);
        assert!(rule.annotation_providers()[0].requires.is_empty());
        let rel = &rule.relation_providers()[0];
        assert_eq!(rel.source.capture, WHOLE_MATCH);
        assert!(rel.target.is_identity());
        assert!(!rel.bidirectional);
        assert!(rel.value.is_empty());
    }

    #[test]
    fn endpoint_aliases_and_projections() {
        let rules =
            compile("[r]\ntrigger: (?<a> ~) (?<b> ~)\nrelation: x\n  type=t\n  source{a}=cxt($_, 1)\n  target{b}=@ENTITY\n")
                .unwrap();
        let rel = &rules[0].relation_providers()[0];
        assert_eq!(rel.source.capture, "a");
        assert!(!rel.source.is_identity());
        assert_eq!(rel.target.projection.pattern(), "@ENTITY");
    }

    #[test]
    fn hash_tags_are_not_comments() {
        let rules = compile("[r]\ntrigger:\n  #DT\n  # a comment\n  #NN\nannotation: type=NP\n").unwrap();
        assert_eq!(rules[0].trigger().pattern(), "#DT #NN");
    }

    #[test]
    fn errors_carry_lines() {
        assert_eq!(error_line("trigger: 'a'\n"), 1);
        assert_eq!(error_line("[r]\n  type=X\n"), 2);
        assert_eq!(error_line("[r]\ntrigger: 'a'\nannotation:\n  kind=X\n"), 4);
        assert_eq!(error_line("[r]\ntrigger: 'a'\nannotation: capture=missing\n  type=X\n"), 3);
        assert_eq!(error_line("[r]\ntrigger: 'a'\nannotation: type=X\n  requires=nope\n"), 4);
        assert_eq!(error_line("[r]\ntrigger: 'a' (\n"), 2);
        assert_eq!(error_line("[r]\ntrigger: 'a'\n[r]\ntrigger: 'b'\n"), 3);
        assert_eq!(error_line("[r]\nannotation: type=X\n"), 1);
        assert_eq!(error_line("[r]\ntrigger: 'a'\nannotation:\n  capture=*\n"), 3);
        assert_eq!(error_line("[r]\ntrigger: 'a'\nrelation: x\n  type=t\n  @>{*}=lower(\n"), 5);
        assert_eq!(error_line("[r]\ntrigger: 'a'\nrelation: x\n  type=t\n  @>{*}=len()\n"), 5);
        assert_eq!(error_line("[r]\ntrigger: 'a'\nrelation: x\n  type=t\nrelation: x\n  type=u\n"), 5);
        assert_eq!(error_line("[r]\ntrigger: 'a'\nrelation: x\n  type=t\n  bidirectional=yes\n"), 5);
        assert_eq!(error_line("[r]\ntrigger: 'a'\nrelation: x\n  type=t\n  middle{*}=$_\n"), 5);
    }

    #[test]
    fn several_rules_in_one_program() {
        let rules = compile("[a]\ntrigger: 'x'\n\n[b]\ntrigger: 'y'\nannotation: type=Y\n").unwrap();
        let names: Vec<&str> = rules.iter().map(Rule::name).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
