#![allow(dead_code)]

use idemsql_core::{RewriteConfig, RewriteOutcome, rewrite_document};

/// A migration mixing every tracked kind with statements the rewriter must
/// leave alone.
pub const MIXED_MIGRATION: &str = r#"-- 20240101000000_notes.sql
CREATE TABLE notes (
  id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
  owner uuid NOT NULL,
  body text NOT NULL DEFAULT ';'
);

CREATE INDEX notes_owner_idx ON notes (owner);

CREATE FUNCTION touch_updated_at() RETURNS trigger AS $$
BEGIN
  NEW.updated_at = now();
  RETURN NEW;
END;
$$ LANGUAGE plpgsql;

ALTER TABLE notes ADD COLUMN updated_at timestamptz NOT NULL DEFAULT now();

CREATE TRIGGER notes_touch BEFORE UPDATE ON notes
  FOR EACH ROW EXECUTE FUNCTION touch_updated_at();

ALTER TABLE notes ENABLE ROW LEVEL SECURITY;

CREATE POLICY "Owners can read their notes" ON notes
  FOR SELECT USING (auth.uid() = owner);

INSERT INTO audit_log (message) VALUES ('notes; created');
"#;

pub fn rewrite(source: &str) -> RewriteOutcome {
    rewrite_document(source, &RewriteConfig::default())
}

/// Rewrites `source` and asserts a second pass changes nothing.
pub fn rewrite_stable(source: &str) -> String {
    let first = rewrite(source);
    let second = rewrite(&first.text);
    assert_eq!(
        second.text, first.text,
        "second rewrite must be byte-identical"
    );
    assert!(!second.changed, "second rewrite must report no change");
    first.text
}
