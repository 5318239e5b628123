use std::ops::Range;

use crate::protected_ranges;

/// Collapses runs of blank lines to a single blank line, starts every
/// statement that shares a line with a preceding terminator on a line of its
/// own, and strips trailing spaces and tabs after a terminator at the end of
/// a line.
///
/// Text inside a string, quoted identifier, dollar quote or comment is copied
/// verbatim, and a `;` inside one never counts as a terminator.
#[must_use]
pub fn normalize_whitespace(source: &str) -> String {
    let protected = protected_ranges(source);
    let mut output = String::with_capacity(source.len());
    let mut offset = 0;
    let mut blank_run = 0_usize;

    for line in source.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let (content, ending) = split_line_ending(line);

        let verbatim = match covering(&protected, start) {
            Some(range) if range.start < start => Some((range.end - start).min(content.len())),
            _ => None,
        };
        let Some(verbatim) = verbatim else {
            if content.trim().is_empty() {
                blank_run += 1;
                if blank_run == 1 {
                    output.push_str(line);
                }
                continue;
            }
            blank_run = 0;
            push_statements(&mut output, &protected, start, content, ending);
            continue;
        };

        blank_run = 0;
        output.push_str(&content[..verbatim]);
        push_statements(
            &mut output,
            &protected,
            start + verbatim,
            &content[verbatim..],
            ending,
        );
    }

    output
}

/// Copies one line fragment starting at `base`, breaking the line after each
/// terminator that another statement follows.
fn push_statements(
    output: &mut String,
    protected: &[Range<usize>],
    base: usize,
    content: &str,
    ending: &str,
) {
    let line_break = if ending.is_empty() { "\n" } else { ending };
    let mut rest = content;
    let mut rest_start = base;

    while let Some(split) = next_break(protected, rest_start, rest) {
        output.push_str(&rest[..split]);
        output.push_str(line_break);
        let next = rest[split..].trim_start_matches([' ', '\t']);
        rest_start += rest.len() - next.len();
        rest = next;
    }

    let trimmed = rest.trim_end_matches([' ', '\t']);
    let trims_terminator = trimmed.len() < rest.len()
        && trimmed.ends_with(';')
        && covering(protected, rest_start + trimmed.len() - 1).is_none();
    output.push_str(if trims_terminator { trimmed } else { rest });
    output.push_str(ending);
}

/// Index just past the first terminator in `content` followed by more SQL on
/// the same line. A trailing comment does not count.
fn next_break(protected: &[Range<usize>], base: usize, content: &str) -> Option<usize> {
    content
        .match_indices(';')
        .map(|(index, _)| index)
        .filter(|index| covering(protected, base + index).is_none())
        .find_map(|index| {
            let after = content[index + 1..].trim_start_matches([' ', '\t']);
            let continues = !after.is_empty() && !after.starts_with("--") && !after.starts_with("/*");
            continues.then_some(index + 1)
        })
}

fn split_line_ending(line: &str) -> (&str, &str) {
    let content = line.strip_suffix('\n').unwrap_or(line);
    let content = content.strip_suffix('\r').unwrap_or(content);
    (content, &line[content.len()..])
}

/// The protected range containing `offset`. `ranges` are sorted and disjoint.
fn covering(ranges: &[Range<usize>], offset: usize) -> Option<&Range<usize>> {
    let index = ranges.partition_point(|range| range.start <= offset);
    index
        .checked_sub(1)
        .map(|index| &ranges[index])
        .filter(|range| offset < range.end)
}

#[cfg(test)]
mod tests {
    use super::normalize_whitespace;

    #[test]
    fn blank_line_runs_collapse_to_one() {
        assert_eq!(
            normalize_whitespace("CREATE TABLE a (id int);\n\n\n\nCREATE TABLE b (id int);\n"),
            "CREATE TABLE a (id int);\n\nCREATE TABLE b (id int);\n"
        );
    }

    #[test]
    fn trailing_blanks_after_terminator_are_trimmed() {
        assert_eq!(
            normalize_whitespace("SELECT 1;  \t\r\nSELECT 2; -- keep   \n"),
            "SELECT 1;\r\nSELECT 2; -- keep   \n"
        );
    }

    #[test]
    fn statements_sharing_a_line_are_split() {
        assert_eq!(
            normalize_whitespace("CREATE TABLE a (id int); CREATE TABLE b (id int);   \n"),
            "CREATE TABLE a (id int);\nCREATE TABLE b (id int);\n"
        );
        assert_eq!(
            normalize_whitespace("SELECT 1;SELECT 2;\r\nSELECT 3; SELECT 4;"),
            "SELECT 1;\r\nSELECT 2;\r\nSELECT 3;\nSELECT 4;"
        );
    }

    #[test]
    fn protected_terminators_and_trailing_comments_keep_their_line() {
        let sql = "INSERT INTO t VALUES ('a; b'); -- done; really\nDO $$ BEGIN NULL; END $$;\n";
        assert_eq!(normalize_whitespace(sql), sql);
    }

    #[test]
    fn statement_after_a_multiline_body_is_split() {
        assert_eq!(
            normalize_whitespace(
                "CREATE FUNCTION f() RETURNS int AS $$\n  SELECT 1;  \n$$ LANGUAGE sql; CREATE TABLE t (id int);\n"
            ),
            "CREATE FUNCTION f() RETURNS int AS $$\n  SELECT 1;  \n$$ LANGUAGE sql;\nCREATE TABLE t (id int);\n"
        );
    }

    #[test]
    fn dollar_quoted_bodies_are_untouched() {
        let sql = "CREATE FUNCTION f() RETURNS void AS $$\nBEGIN\n\n\n\n  PERFORM 1;   \nEND;\n$$ LANGUAGE plpgsql;\n";
        assert_eq!(normalize_whitespace(sql), sql);
    }

    #[test]
    fn terminator_inside_string_is_not_trimmed() {
        let sql = "INSERT INTO t VALUES ('a;  \nb');\n";
        assert_eq!(normalize_whitespace(sql), sql);
    }
}
