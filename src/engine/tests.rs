use super::*;
use crate::{Document, Options, Range, Registry, WordList};

fn rules(program: &str) -> Vec<Rule> {
    Rule::compile(program, "test.rules").unwrap()
}

fn one_rule(program: &str) -> Rule {
    rules(program).remove(0)
}

fn texts(doc: &Document, ann_type: &str) -> Vec<String> {
    doc.annotations_of(ann_type).map(|a| doc.span(a.range()).text().to_string()).collect()
}

#[test]
fn vehicle_mention_is_created_once() {
    let rule = one_rule(
        "[vehicle]
trigger: 'old' 'car'
annotation: capture=*
  type=VEHICLE_MENTION
",
    );
    let mut doc = Document::from_whitespace("d", "I bought an old car yesterday");
    let report = rule.execute(&mut doc);

    assert_eq!(texts(&doc, "VEHICLE_MENTION"), ["old car"]);
    assert_eq!(report.matches, 1);
    assert_eq!(report.annotations_created, 1);
    assert_eq!(report.annotations_retracted, 0);
    let ann = doc.annotations_of("VEHICLE_MENTION").next().unwrap();
    assert_eq!(ann.provenance(), Some("test.rules::vehicle"));
}

const SVO: &str = "[svo]
trigger: (?<subj> #NNP) (?<verb> #VERB) (?<obj> #NNP)?
annotation: capture=subj
  type=AGENT
  requires=B
annotation: capture=verb
  type=EVENT
relation: A
  type=object
  @>{verb}=$_
  @<{obj}=$_
relation: B
  type=agent
  requires=A
  @>{verb}=$_
  @<{subj}=$_
";

#[test]
fn prerequisite_without_pairing_blocks_and_retracts() {
    let rule = one_rule(SVO);
    let mut doc = Document::from_tagged("d", "John/NNP left/VBD");
    let report = rule.execute(&mut doc);

    assert_eq!(report.matches, 1);
    assert_eq!(report.relations_blocked, 1);
    assert_eq!(report.relations_committed, 0);
    assert_eq!(report.annotations_retracted, 1);
    assert!(texts(&doc, "AGENT").is_empty());
    assert_eq!(texts(&doc, "EVENT"), ["left"]);
    assert_eq!(doc.relations().count(), 0);
}

#[test]
fn satisfied_prerequisites_commit_everything() {
    let rule = one_rule(SVO);
    let mut doc = Document::from_tagged("d", "John/NNP met/VBD Sally/NNP");
    let report = rule.execute(&mut doc);

    assert_eq!(report.relations_committed, 2);
    assert_eq!(report.annotations_retracted, 0);
    assert_eq!(texts(&doc, "AGENT"), ["John"]);

    let event = doc.annotations_of("EVENT").next().unwrap().id();
    let agent = doc.annotations_of("AGENT").next().unwrap().id();
    let edges = doc.outgoing(event, Some("agent"));
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target, agent);
    let object = doc.outgoing(event, Some("object"));
    assert_eq!(doc.annotation_span(object[0].target).unwrap().text(), "Sally");
}

#[test]
fn commit_checks_candidates_but_retraction_checks_commits() {
    // A has candidates but is withheld (C has none); B only needs A's
    // candidates, so B commits. X needs A to have committed and is retracted,
    // taking B's edge into it along.
    let rule = one_rule(
        "[quirk]
trigger: (?<x> ~) (?<y> ~) (?<z> 'never')?
annotation: capture=x
  type=X
  requires=A
annotation: capture=y
  type=Y
  requires=B
relation: C
  type=c
  @>{x}=$_
  @<{z}=$_
relation: A
  type=a
  requires=C
  @>{x}=$_
  @<{y}=$_
relation: B
  type=b
  requires=A
  @>{y}=$_
  @<{x}=$_
",
    );
    let mut doc = Document::from_whitespace("d", "p q");
    let report = rule.execute(&mut doc);

    assert_eq!(report.relations_blocked, 1);
    assert_eq!(report.relations_committed, 1);
    assert_eq!(report.annotations_retracted, 1);
    assert!(texts(&doc, "X").is_empty());
    assert_eq!(texts(&doc, "Y"), ["q"]);
    assert_eq!(doc.relations().count(), 0);
}

#[test]
fn bidirectional_relations_mirror_edges() {
    let rule = one_rule(
        "[pair]
trigger: (?<a> 'Tom') 'and' (?<b> 'Jerry')
relation: partner
  type=pair
  value=partner
  bidirectional=true
  @>{a}=$_
  @<{b}=$_
",
    );
    let mut doc = Document::from_whitespace("d", "Tom and Jerry");
    rule.execute(&mut doc);
    let edges: Vec<(String, String)> = doc
        .relations()
        .map(|(source, r)| {
            let from = doc.annotation_span(source).unwrap().text().to_string();
            let to = doc.annotation_span(r.target).unwrap().text().to_string();
            (from, to)
        })
        .collect();
    assert_eq!(edges, [("Tom".to_string(), "Jerry".to_string()), ("Jerry".to_string(), "Tom".to_string())]);
    assert!(doc.relations().all(|(_, r)| r.value == "partner"));
}

#[test]
fn unclaimed_whole_match_defaults_to_tokens() {
    let rule = one_rule(
        "[det]
trigger: 'the' (?<head> ~)
annotation: capture=head
  type=HEAD
relation: det
  type=det
  @>{*}=$_
  @<{head}=$_
",
    );
    let mut doc = Document::from_whitespace("d", "the dog");
    let report = rule.execute(&mut doc);
    assert_eq!(report.relations_committed, 2);
    let head = doc.annotations_of("HEAD").next().unwrap().id();
    assert!(doc.relations().all(|(source, r)| r.target == head && doc.is_token(source)));
}

#[test]
fn endpoint_projections_pick_related_spans() {
    let rule = one_rule(
        "[when]
trigger: 'old' 'car'
annotation: type=VEHICLE_MENTION
relation: next
  type=followed_by
  @>{*}=$_
  @<{*}=cxt($_, 1)
",
    );
    let mut doc = Document::from_whitespace("d", "I bought an old car yesterday");
    rule.execute(&mut doc);
    let mention = doc.annotations_of("VEHICLE_MENTION").next().unwrap().id();
    let edges = doc.outgoing(mention, Some("followed_by"));
    assert_eq!(edges.len(), 1);
    assert_eq!(doc.annotation_span(edges[0].target).unwrap().text(), "yesterday");
}

#[test]
fn reexecution_reuses_annotations() {
    let rule = one_rule("[v]\ntrigger: 'car'\nannotation: type=V\n  $KIND='car'\n");
    let mut doc = Document::from_whitespace("d", "a car");
    rule.execute(&mut doc);
    let second = rule.execute(&mut doc);
    assert_eq!(second.annotations_created, 0);
    assert_eq!(second.annotations_reused, 1);
    assert_eq!(doc.annotations_of("V").count(), 1);
}

#[test]
fn reused_annotations_are_never_retracted() {
    let mut doc = Document::from_whitespace("d", "a car");
    let car = doc.token_span_range(1..2).unwrap();
    doc.create_annotation("V", car, Default::default());
    let rule = one_rule(
        "[v]
trigger: 'car'
annotation: type=V
  requires=r
relation: r
  type=t
  @>{*}=$_
  @<{*}=cxt($_, 5)
",
    );
    let report = rule.execute(&mut doc);
    assert_eq!(report.annotations_reused, 1);
    assert_eq!(report.annotations_retracted, 0);
    assert_eq!(doc.annotations_of("V").count(), 1);
}

#[test]
fn writes_are_visible_to_later_matches() {
    let rule = one_rule("[chain]\ntrigger: (?< @X) 'a'\nannotation: type=X\n");
    let mut doc = Document::from_whitespace("d", "a a a");
    let first = doc.token_span_range(0..1).unwrap();
    doc.create_annotation("X", first, Default::default());
    let report = rule.execute(&mut doc);
    assert_eq!(report.matches, 2);
    assert_eq!(doc.annotations_of("X").count(), 3);
}

#[test]
fn rules_whose_trigger_cannot_fire_are_skipped() {
    let rule = one_rule("[boat]\ntrigger: 'boat'\nannotation: type=V\n");
    let mut doc = Document::from_whitespace("d", "a car");
    let report = rule.execute(&mut doc);
    assert!(report.skipped);
    assert_eq!(report.matches, 0);
}

#[test]
fn scope_bounds_matches() {
    let mut doc = Document::from_whitespace("d", "it rained . the sun came out");
    doc.create_annotation("sentence", doc.token_span_range(0..3).unwrap(), Default::default());
    doc.create_annotation("sentence", doc.token_span_range(3..7).unwrap(), Default::default());
    let rule = one_rule("[first]\ntrigger: ^ ~\nannotation: type=FIRST\n");

    rule.execute_with(&mut doc, &Options::scoped("sentence"));
    assert_eq!(texts(&doc, "FIRST"), ["it", "the"]);

    let mut unscoped = Document::from_whitespace("d", "it rained . the sun came out");
    rule.execute(&mut unscoped);
    assert_eq!(texts(&unscoped, "FIRST"), ["it"]);
}

#[test]
fn rule_sets_run_in_program_order() {
    let registry = Registry::new().with_lexicon("vehicles", WordList::new(["car", "pickup truck"]));
    let set = RuleSet::compile(
        "[vehicle]
trigger: %vehicles
annotation: type=VEHICLE

[modified]
trigger: (?<mod> #ADJ)+ (?<head> @VEHICLE)
annotation: capture=mod
  type=MODIFIER
relation: amod
  type=amod
  @>{head}=@VEHICLE
  @<{mod}=$_
",
        "fleet.rules",
        &registry,
    )
    .unwrap();
    let mut doc = Document::from_tagged("d", "a/DT red/JJ pickup/NN truck/NN and/CC a/DT car/NN");
    let report = set.execute(&mut doc);

    assert_eq!(texts(&doc, "VEHICLE"), ["pickup truck", "car"]);
    assert_eq!(texts(&doc, "MODIFIER"), ["red"]);
    assert_eq!(report.relations_committed(), 1);
    assert_eq!(report.rules[0].rule, "fleet.rules::vehicle");
    let vehicle = doc.annotations_of("VEHICLE").next().unwrap().id();
    assert_eq!(doc.incoming(vehicle, Some("amod")).len(), 0);
    assert_eq!(doc.outgoing(vehicle, Some("amod")).len(), 1);
}

#[test]
fn compiled_rules_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Rule>();
    assert_send_sync::<RuleSet>();
}

#[test]
fn annotations_written_with_fixed_attributes() {
    let rule = one_rule("[v]\ntrigger: 'car'\nannotation: type=V\n  $KIND='car'\n  $WHEELS=4\n  $NEW=true\n");
    let mut doc = Document::from_whitespace("d", "a car");
    rule.execute(&mut doc);
    let ann = doc.annotations_of("V").next().unwrap();
    assert_eq!(ann.attribute("KIND"), Some(&crate::AttrValue::Str("car".into())));
    assert_eq!(ann.attribute("WHEELS"), Some(&crate::AttrValue::Number(4.0)));
    assert_eq!(ann.attribute("NEW"), Some(&crate::AttrValue::Bool(true)));
    assert_eq!(ann.range(), Range::new(2, 5));
}
