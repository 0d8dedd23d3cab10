use std::fs;

use ogcard::template::{PARTNER_LOGO_PARTIAL, SITE_LOGO_PARTIAL, TEMPLATE_FILE};
use ogcard::{content_hash, render_template, Error, Templates};
use tempfile::tempdir;

const MARKERS: &[&str] = &[
    "{% if description %}",
    "{% endif %}",
    "{{ description }}",
    "{{ title }}",
    "{% include",
];

fn fixture_templates() -> (tempfile::TempDir, Templates) {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join(TEMPLATE_FILE),
        concat!(
            "<header>{% include \"partials/site-logo.html\" %}|",
            "{% include \"partials/partner-logo.html\" %}</header>\n",
            "<h1>{{ title }}</h1>\n",
            "{% if description %}\n<p>{{ description }}</p>\n{% endif %}\n",
        ),
    )
    .unwrap();
    fs::write(
        dir.path().join(SITE_LOGO_PARTIAL),
        "{# editorial note:\n   keep this square #}<svg id=\"site\"/>",
    )
    .unwrap();
    fs::write(
        dir.path().join(PARTNER_LOGO_PARTIAL),
        "<svg id=\"partner\">{# inline note #}</svg>",
    )
    .unwrap();
    let templates = Templates::new(dir.path());
    (dir, templates)
}

#[test]
fn partials_are_embedded_without_annotations() {
    let (_dir, templates) = fixture_templates();
    let html = templates.render("Title", "Desc").unwrap();

    assert!(html.starts_with("<header><svg id=\"site\"/>|<svg id=\"partner\"></svg></header>"));
    assert!(!html.contains("{#"));
    assert!(!html.contains("#}"));
    assert!(!html.contains("editorial note"));
}

#[test]
fn description_is_substituted_when_present() {
    let (_dir, templates) = fixture_templates();
    let html = templates.render("T", "D").unwrap();

    assert!(html.contains("<h1>T</h1>"));
    assert!(html.contains("<p>D</p>"));
    for marker in MARKERS {
        assert!(!html.contains(marker), "leftover marker {}", marker);
    }
}

#[test]
fn empty_description_drops_the_whole_block() {
    let (_dir, templates) = fixture_templates();
    let html = templates.render("T", "").unwrap();

    assert!(html.contains("<h1>T</h1>"));
    assert!(!html.contains("<p>"));
    for marker in MARKERS {
        assert!(!html.contains(marker), "leftover marker {}", marker);
    }
    assert!(html.ends_with("<h1>T</h1>\n\n"));
}

#[test]
fn title_is_inserted_verbatim() {
    let (_dir, templates) = fixture_templates();
    let html = templates.render("A & B <em>now</em>", "").unwrap();
    assert!(html.contains("<h1>A & B <em>now</em></h1>"));
}

#[test]
fn composing_is_deterministic() {
    let a = render_template("Welcome", "Intro page").unwrap();
    let b = render_template("Welcome", "Intro page").unwrap();
    assert_eq!(a, b);
    assert_eq!(content_hash(&a), content_hash(&b));
}

#[test]
fn fingerprint_follows_the_description() {
    let with = content_hash(&render_template("Welcome", "Intro page").unwrap());
    let other = content_hash(&render_template("Welcome", "Another page").unwrap());
    let without = content_hash(&render_template("Welcome", "").unwrap());
    assert_ne!(with, other);
    assert_ne!(with, without);
}

#[test]
fn bundled_partials_never_leak_annotations() {
    for (title, description) in [("Welcome", "Intro page"), ("Only a title", "")] {
        let html = render_template(title, description).unwrap();
        assert!(!html.contains("{#"), "annotation leaked for {:?}", title);
        assert!(!html.contains("#}"), "annotation leaked for {:?}", title);
    }
}

#[test]
fn missing_partial_is_fatal() {
    let (dir, templates) = fixture_templates();
    fs::remove_file(dir.path().join(PARTNER_LOGO_PARTIAL)).unwrap();

    match templates.render("T", "D") {
        Err(Error::Template { path, .. }) => assert!(path.ends_with(PARTNER_LOGO_PARTIAL)),
        other => panic!("expected a template error, got {:?}", other),
    }
}
