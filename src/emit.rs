use std::io::{self, Write};

use crate::config::Config;
use crate::group::{ChooseState, Entry, GroupSet};
use crate::path::{is_child_path, tail_expr, Segment};

/// Stage 5: walk entries in input order and render one `set` line each,
/// substituting the chosen predicate for every positional selector.
/// Advancing the per-position state machines requires `&mut` access to the
/// groups; the traversal order is the correctness contract — each
/// `count()=0` disjunct must precede the record that discharges it.
pub fn write_script<W: Write>(
    out: &mut W,
    entries: &[Entry],
    groups: &mut GroupSet,
    cfg: &Config,
) -> io::Result<()> {
    for idx in 0..entries.len() {
        let entry = &entries[idx];
        let next = entries.get(idx + 1);
        let value = entry.value.as_deref().filter(|v| !v.is_empty());
        if cfg.verbose {
            match (value, entry.value_qq.as_deref()) {
                (Some(_), Some(qq)) => writeln!(out, "#   {}  {}", entry.path, qq)?,
                _ => writeln!(out, "#   {}", entry.path)?,
            }
        }
        // A valueless node whose path is a strict prefix of the next
        // entry's path is created implicitly by the deeper `set`.
        if value.is_none() {
            if let Some(next) = next {
                if is_child_path(&entry.path, &next.path) {
                    tracing::trace!(path = %entry.path, "anchor suppressed");
                    continue;
                }
            }
        }
        write_entry(out, entry, groups, cfg)?;
        if cfg.pretty {
            if let Some(next) = next {
                let this_seg = entry.segments.first();
                let next_seg = next.segments.first();
                let this_group = this_seg.and_then(|s| s.group);
                let next_group = next_seg.and_then(|s| s.group);
                let new_block = this_group != next_group
                    || (this_group.is_some()
                        && this_seg.map(|s| s.position) != next_seg.map(|s| s.position));
                if new_block {
                    writeln!(out)?;
                }
            }
        }
    }
    Ok(())
}

fn write_entry<W: Write>(
    out: &mut W,
    entry: &Entry,
    groups: &mut GroupSet,
    cfg: &Config,
) -> io::Result<()> {
    write!(out, "set ")?;
    for segment in &entry.segments {
        write_segment(out, segment, entry.value_qq.as_deref(), groups, cfg)?;
    }
    match entry.value_qq.as_deref() {
        Some(qq) => writeln!(out, " {}", qq),
        None => writeln!(out),
    }
}

/// Render one path segment, followed by its predicate when the segment
/// carries a position.
fn write_segment<W: Write>(
    out: &mut W,
    segment: &Segment,
    entry_value_qq: Option<&str>,
    groups: &mut GroupSet,
    cfg: &Config,
) -> io::Result<()> {
    if segment.is_seq_form() {
        write!(out, "{}{}", segment.text(), cfg.seq_wildcard())?;
    } else {
        write!(out, "{}", segment.text())?;
    }
    let Some(gid) = segment.group else {
        // Trailing piece after the last selector; nothing else to print.
        return Ok(());
    };
    let group = &mut groups.groups[gid.0];
    let position = segment
        .position
        .expect("grouped segment carries a position");

    let Some(chosen_id) = group.chosen_tail[position] else {
        if group.state[position] != ChooseState::NoChildNodes {
            tracing::warn!(head = %group.head, position, "no chosen tail at emission");
        }
        if !segment.is_seq_form() {
            write!(out, "[*]")?;
        }
        return Ok(());
    };

    let state = group.state[position];
    let width = group.pretty_width[position];
    let regexp = cfg.regexp_enabled();
    let chosen = &group.tails[chosen_id.0];
    let ct = tail_expr(&chosen.simple_tail);

    match state {
        ChooseState::FirstTail
        | ChooseState::ChosenTailStart
        | ChooseState::ChosenTailDone
        | ChooseState::FirstTailPlusPosition => {
            if state == ChooseState::ChosenTailStart {
                // The first line at a position must stay creatable: a plain
                // equality predicate can build the node, a count() clause
                // cannot.
                group.state[position] = ChooseState::ChosenTailWip;
            }
            if state == ChooseState::FirstTail
                && chosen.simple_tail.is_empty()
                && group.occupied_positions() == 1
            {
                // The group holds a single record; any sibling the
                // wildcard could confuse it with does not exist.
                if chosen.value.is_none() && !segment.is_seq_form() {
                    write!(out, "[*]")?;
                }
                return Ok(());
            }
            if state == ChooseState::FirstTailPlusPosition
                && chosen.value.is_none()
                && chosen.simple_tail.is_empty()
            {
                // A record with no content to predicate on: `[.]` matches
                // anything, so only the ordinal remains.
                write!(out, "[{}]", group.subgroup_position[position])?;
                return Ok(());
            }
            if chosen.value.is_none() {
                write!(out, "[{}]", ct)?;
            } else if regexp {
                let body = chosen.value_re.as_deref().unwrap_or("''");
                write!(out, "[{}=~regexp({:<width$})]", ct, body)?;
            } else {
                let body = chosen.value_qq.as_deref().unwrap_or("''");
                write!(out, "[{}={:<width$}]", ct, body)?;
            }
            if state == ChooseState::FirstTailPlusPosition {
                // Duplicate records: fall back to the ordinal within the
                // first-tail subgroup.
                write!(out, "[{}]", group.subgroup_position[position])?;
            }
        }
        ChooseState::ChosenTailWip => {
            if chosen.value.is_none() {
                write!(out, "[{} or count({})=0]", ct, ct)?;
            } else if regexp {
                let body = chosen.value_re.as_deref().unwrap_or("''");
                write!(out, "[{}=~regexp({:<width$}) or count({})=0]", ct, body, ct)?;
            } else {
                let body = chosen.value_qq.as_deref().unwrap_or("''");
                write!(out, "[{}={:<width$} or count({})=0]", ct, body, ct)?;
            }
            if chosen.simple_tail == segment.simple_tail
                && chosen.value_qq.as_deref() == entry_value_qq
            {
                group.state[position] = ChooseState::ChosenTailDone;
            }
        }
        ChooseState::ChosenPlusFirstStart
        | ChooseState::ChosenPlusFirstWip
        | ChooseState::ChosenPlusFirstDone => {
            let first_id = group.first_tail[position].unwrap_or(chosen_id);
            let first = &group.tails[first_id.0];
            let ft = tail_expr(&first.simple_tail);
            let wip = state == ChooseState::ChosenPlusFirstWip;
            match (first.value.is_some(), regexp) {
                (false, true) => {
                    let body = chosen.value_re.as_deref().unwrap_or("''");
                    if wip {
                        write!(
                            out,
                            "[{} and ( {}=~regexp({}) or count({})=0 )]",
                            ft, ct, body, ct
                        )?;
                    } else {
                        write!(out, "[{} and {}=~regexp({})]", ft, ct, body)?;
                    }
                }
                (false, false) => {
                    let body = chosen.value_qq.as_deref().unwrap_or("''");
                    if wip {
                        write!(out, "[{} and ( {}={} or count({})=0 )]", ft, ct, body, ct)?;
                    } else {
                        write!(out, "[{} and {}={}]", ft, ct, body)?;
                    }
                }
                (true, true) => {
                    let fbody = first.value_re.as_deref().unwrap_or("''");
                    let body = chosen.value_re.as_deref().unwrap_or("''");
                    if wip {
                        write!(
                            out,
                            "[{}=~regexp({:<width$}) and ( {}=~regexp({}) or count({})=0 ) ]",
                            ft, fbody, ct, body, ct
                        )?;
                    } else {
                        write!(
                            out,
                            "[{}=~regexp({:<width$}) and {}=~regexp({})]",
                            ft, fbody, ct, body
                        )?;
                    }
                }
                (true, false) => {
                    let fbody = first.value_qq.as_deref().unwrap_or("''");
                    let body = chosen.value_qq.as_deref().unwrap_or("''");
                    if wip {
                        write!(
                            out,
                            "[{}={:<width$} and ( {}={} or count({})=0 ) ]",
                            ft, fbody, ct, body, ct
                        )?;
                    } else {
                        write!(out, "[{}={:<width$} and {}={}]", ft, fbody, ct, body)?;
                    }
                }
            }
            if state == ChooseState::ChosenPlusFirstStart {
                group.state[position] = ChooseState::ChosenPlusFirstWip;
            } else if wip
                && chosen.simple_tail == segment.simple_tail
                && chosen.value_qq.as_deref() == entry_value_qq
            {
                group.state[position] = ChooseState::ChosenPlusFirstDone;
            }
        }
        ChooseState::NotDone | ChooseState::NoChildNodes => {
            tracing::warn!(head = %group.head, position, ?state, "unexpected state at emission");
            if !segment.is_seq_form() {
                write!(out, "[*]")?;
            }
        }
    }
    Ok(())
}
