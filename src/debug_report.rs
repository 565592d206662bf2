use tokenrules::{Document, Expression, Match, RunReport, TOKEN, TokenPattern, Value};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
        if self.enabled { format!("{}{}{}", color, s.as_ref(), ansi::RESET) } else { s.as_ref().to_string() }
    }

    fn bold(&self, s: impl AsRef<str>) -> String {
        self.paint(s, ansi::BOLD)
    }

    fn dim(&self, s: impl AsRef<str>) -> String {
        self.paint(s, ansi::DIM)
    }

    fn section(&self, title: &str) {
        println!("\n{}", self.paint(format!("━━━ {title} ━━━"), ansi::GRAY));
    }
}

fn header(doc: &Document, palette: &Palette, what: &str) {
    println!("\n{}", palette.bold(palette.paint(format!("⚙  {what}: \"{}\"", doc.text()), ansi::CYAN)));
}

pub fn print_matches(doc: &Document, pattern: &TokenPattern, matches: &[Match], palette: &Palette) {
    header(doc, palette, "Matching");
    println!("  {} {}", palette.dim("pattern:"), palette.paint(pattern.pattern(), ansi::BLUE));

    palette.section("Matches");
    if matches.is_empty() {
        println!("{}", palette.dim("  No matches"));
        println!("\n{}", palette.dim("  Tip: run with --debug to see the compiled pattern's required words"));
        return;
    }
    for (idx, found) in matches.iter().enumerate() {
        println!(
            "  {} {} {} {}",
            palette.paint(format!("[{idx}]"), ansi::GRAY),
            palette.bold(palette.paint(found.text(doc), ansi::GREEN)),
            palette.dim("│"),
            palette.paint(format!("tokens {}..{}", found.tokens.start, found.tokens.end), ansi::YELLOW),
        );
        for (name, ranges) in found.groups().filter(|(name, _)| *name != tokenrules::WHOLE_MATCH) {
            let texts: Vec<String> = ranges.iter().map(|r| format!("\"{}\"", doc.span(*r).text())).collect();
            println!("      {} {}", palette.paint(format!("{name}:"), ansi::BLUE), texts.join(", "));
        }
    }
}

pub fn print_expression(doc: &Document, expr: &Expression, palette: &Palette) {
    header(doc, palette, "Evaluating");
    println!(
        "  {} {}  {} {}",
        palette.dim("expression:"),
        palette.paint(expr.pattern(), ansi::BLUE),
        palette.dim("type:"),
        palette.paint(expr.kind().to_string(), ansi::CYAN)
    );

    palette.section("Tokens");
    for (idx, token) in doc.tokens().enumerate() {
        let value = expr.apply_as_object(&Value::Span(token));
        let shown = match &value {
            Value::Null => palette.dim("null"),
            Value::Bool(true) => palette.paint("true", ansi::GREEN),
            Value::Bool(false) => palette.dim("false"),
            other => palette.paint(other.to_string(), ansi::GREEN),
        };
        println!(
            "  {} {:<16} {} {}",
            palette.paint(format!("[{idx}]"), ansi::GRAY),
            token.text(),
            palette.dim("│"),
            shown
        );
    }
}

pub fn print_run(doc: &Document, report: &RunReport, palette: &Palette) {
    header(doc, palette, "Executing");

    palette.section("Rules");
    for rule in &report.rules {
        let line = if rule.skipped { palette.dim(rule.to_string()) } else { palette.paint(rule.to_string(), ansi::BLUE) };
        println!("  {line}");
    }

    palette.section("Annotations");
    let mut any = false;
    for ann in doc.annotations().filter(|a| a.ann_type() != TOKEN) {
        any = true;
        let attrs: Vec<String> = ann.attributes().iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!(
            "  {} {} {} {} {}",
            palette.paint(ann.id().to_string(), ansi::GRAY),
            palette.bold(palette.paint(ann.ann_type(), ansi::GREEN)),
            palette.paint(format!("\"{}\"", doc.span(ann.range()).text()), ansi::YELLOW),
            palette.dim(attrs.join(" ")),
            palette.dim(ann.provenance().unwrap_or_default()),
        );
        for relation in doc.outgoing(ann.id(), None) {
            let target = doc.annotation_span(relation.target).map(|s| s.text()).unwrap_or_default();
            println!(
                "      {} {}{} {} \"{}\"",
                palette.paint("→", ansi::CYAN),
                relation.rel_type,
                if relation.value.is_empty() { String::new() } else { format!(":{}", relation.value) },
                palette.paint(relation.target.to_string(), ansi::GRAY),
                target
            );
        }
    }
    if !any {
        println!("{}", palette.dim("  No annotations produced"));
    }

    palette.section("Timing");
    println!(
        "  Total: {}  │  Matches: {}  │  Skipped rules: {}",
        palette.paint(format!("{:?}", report.total), ansi::GREEN),
        palette.paint(report.matches().to_string(), ansi::CYAN),
        palette.dim(report.skipped().to_string()),
    );
    println!();
}
