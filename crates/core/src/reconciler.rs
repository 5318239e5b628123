use std::ops::Range;

use crate::{
    BlockLayout, Catalog, GuardKey, GuardPredicate, GuardedStatement, ReconcileError, Strategy,
    scanner::creation_identity, sql_literal,
};

/// Result of checking one existence-checked block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Unchanged,
    /// The predicate was rewritten to check the created object.
    Corrected { from: GuardKey, to: GuardKey },
}

/// Makes the guard predicate of `statement` check the object its wrapped
/// creation clause actually creates. The creation clause always wins.
///
/// Statements other than existence-checked blocks are left alone. When no
/// creation clause can be found the statement is not modified.
pub fn reconcile(statement: &mut GuardedStatement) -> Result<Reconciliation, ReconcileError> {
    if statement.strategy != Strategy::ExistenceCheckedBlock {
        return Ok(Reconciliation::Unchanged);
    }
    let Some(layout) = statement.block.clone() else {
        return Ok(Reconciliation::Unchanged);
    };

    let text = &statement.text;
    let malformed = |key: Option<&GuardKey>| ReconcileError::MalformedGuardTarget {
        kind: statement.kind,
        guard_key: key.map_or_else(|| "an unreadable key".to_string(), ToString::to_string),
    };

    let Some(predicate) = GuardPredicate::parse(text, layout.predicate.clone()) else {
        return Err(malformed(statement.guard_key.as_ref()));
    };
    let Some(current) = predicate.key() else {
        return Err(malformed(None));
    };

    let created = creation_identity(text, layout.inner.clone())
        .filter(|(kind, _)| Catalog::for_kind(*kind) == Some(predicate.catalog))
        .and_then(|(_, identity)| GuardKey::from_identity(&identity));
    let Some(created) = created else {
        return Err(malformed(Some(&current)));
    };

    let edits = predicate_edits(&predicate, &created);
    if edits.is_empty() {
        return Ok(Reconciliation::Unchanged);
    }

    let mut corrected = statement.text.clone();
    let mut delta = 0_isize;
    for (range, replacement) in edits.iter().rev() {
        delta += replacement.len() as isize - range.len() as isize;
        corrected.replace_range(range.clone(), replacement);
    }

    let predicate_span = layout.predicate.start..layout.predicate.end.saturating_add_signed(delta);
    let inner =
        layout.inner.start.saturating_add_signed(delta)..layout.inner.end.saturating_add_signed(delta);
    let to = GuardPredicate::parse(&corrected, predicate_span.clone())
        .and_then(|predicate| predicate.key())
        .unwrap_or(created);

    statement.text = corrected;
    statement.guard_key = Some(to.clone());
    statement.block = Some(BlockLayout {
        predicate: predicate_span,
        inner,
    });

    Ok(Reconciliation::Corrected { from: current, to })
}

/// Literal replacements, in source order, that make `predicate` check
/// `created`.
fn predicate_edits(predicate: &GuardPredicate, created: &GuardKey) -> Vec<(Range<usize>, String)> {
    let catalog = predicate.catalog;
    let mut edits = Vec::new();
    let mut appended = String::new();

    // `parse` only accepts predicates that have a name term.
    let Some(name) = predicate.name_term() else {
        return edits;
    };

    if let Some(schema) = &created.schema {
        match predicate.schema_term() {
            Some(term) if &term.literal != schema => {
                edits.push((term.literal_span.clone(), sql_literal(schema)));
            }
            Some(_) => {}
            None => appended.push_str(&format!(
                " AND {} = {}",
                catalog.schema_column(),
                sql_literal(schema)
            )),
        }
    }

    match predicate.table_term() {
        Some(term) if term.literal != created.table => {
            edits.push((term.literal_span.clone(), sql_literal(&created.table)));
        }
        Some(_) => {}
        None => appended.push_str(&format!(
            " AND {} = {}",
            catalog.table_column(),
            sql_literal(&created.table)
        )),
    }

    if name.column != catalog.name_column() {
        edits.push((name.column_span.clone(), catalog.name_column().to_string()));
    }
    if name.literal != created.name {
        edits.push((name.literal_span.clone(), sql_literal(&created.name)));
    }
    if !appended.is_empty() {
        let end = name.literal_span.end;
        edits.push((end..end, appended));
    }

    edits.sort_by_key(|(range, _)| (range.start, range.end));
    edits
}
