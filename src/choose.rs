use crate::config::Config;
use crate::group::{ChooseState, Group, GroupSet, TailId};
use crate::path::is_child_path;
use crate::value::{regexp_value, values_match};

/// Values longer than this are not padded out under `--pretty`.
const MAX_PRETTY_WIDTH: usize = 30;

/// Find the first significant tail at a position: skip null-valued entries
/// that exist only to anchor deeper children. Stops at the first tail with
/// a real value, at a tail whose successor is not its child, or at the end
/// of the list. Returns an index into `tails_at_position[position]`.
pub fn find_first_tail(group: &Group, position: usize) -> Option<usize> {
    let stubs = &group.tails_at_position[position];
    if stubs.is_empty() {
        return None;
    }
    let mut idx = 0;
    while idx + 1 < stubs.len() {
        let tail = group.tail(stubs[idx]);
        if tail.value.as_deref().is_some_and(|v| !v.is_empty()) {
            break;
        }
        let next = group.tail(stubs[idx + 1]);
        if !is_child_path(&tail.simple_tail, &next.simple_tail) {
            break;
        }
        idx += 1;
    }
    Some(idx)
}

/// Pick the predicate recipe for one (group, position), trying the four
/// preference tiers in order. Sets `first_tail` and `state` for the
/// position and returns the chosen tail.
pub fn choose_tail(group: &mut Group, position: usize) -> Option<TailId> {
    let Some(first_idx) = find_first_tail(group, position) else {
        // Does not normally happen: every occupied position gets at least
        // one tail, even for a bare null value. Only a wildcard can be
        // emitted for this segment.
        tracing::warn!(head = %group.head, position, "no child nodes at position");
        group.state[position] = ChooseState::NoChildNodes;
        return None;
    };
    let stubs = group.tails_at_position[position].clone();
    let first_id = stubs[first_idx];
    group.first_tail[position] = Some(first_id);

    // First preference: the first tail+value is unique across the group.
    if group.tail(first_id).value_found == 1 {
        group.state[position] = ChooseState::FirstTail;
        return Some(first_id);
    }

    // Second preference: a unique tail+value whose tail exists at every
    // position in the group.
    for (idx, &candidate) in stubs.iter().enumerate().skip(first_idx) {
        let tail = group.tail(candidate);
        if tail.value_found != 1 {
            continue;
        }
        if (1..=group.max_position).any(|q| tail.found_at[q] == 0) {
            continue;
        }
        // The predicate binds the first occurrence of its simplified tail
        // at this position; an earlier stub with the same tail would
        // capture it instead of the candidate.
        if shadowed(group, &stubs[first_idx..idx], candidate) {
            continue;
        }
        group.state[position] = ChooseState::ChosenTailStart;
        return Some(candidate);
    }

    // Third preference: the first tail is not unique, but combined with a
    // later tail it is, within the subgroup of positions sharing this
    // first tail.
    let sg = group.find_or_create_subgroup(first_id);
    let matching = group.subgroups[sg].matching_positions.clone();
    for (idx, &candidate) in stubs.iter().enumerate().skip(first_idx + 1) {
        let tail = group.tail(candidate);
        let unique_in_subgroup = matching.iter().all(|&q| {
            q == position || (tail.value_found_at[q] == 0 && tail.found_at[q] != 0)
        });
        if !unique_in_subgroup {
            continue;
        }
        if shadowed(group, &stubs[first_idx..idx], candidate) {
            continue;
        }
        group.state[position] = ChooseState::ChosenPlusFirstStart;
        return Some(candidate);
    }

    // Fourth preference: unavoidable duplicate; first tail plus the
    // ordinal within the subgroup.
    group.state[position] = ChooseState::FirstTailPlusPosition;
    Some(first_id)
}

fn shadowed(group: &Group, earlier: &[TailId], candidate: TailId) -> bool {
    let simple_tail = &group.tail(candidate).simple_tail;
    earlier
        .iter()
        .any(|&e| &group.tail(e).simple_tail == simple_tail)
}

/// Populate `chosen_tail`, `first_tail` and `state` for every occupied
/// position of every group, then the regexp and padding widths when the
/// caller asked for them.
pub fn choose_all(groups: &mut GroupSet, cfg: &Config) {
    for group in &mut groups.groups {
        for position in 0..group.tails_at_position.len() {
            if position == 0 && group.tails_at_position[0].is_empty() {
                continue;
            }
            let chosen = choose_tail(group, position);
            group.chosen_tail[position] = chosen;
        }
        if cfg.regexp_enabled() {
            choose_re_width(group, cfg);
        }
        if cfg.pretty {
            choose_pretty_width(group, cfg);
        }
    }
}

/// For each position, the regexp body must stay long enough to tell the
/// chosen value apart from every other value at the same simplified tail
/// in the group: take the longest common prefix, floored by the caller's
/// minimum length. Tier-3 positions need a width for the first tail too.
fn choose_re_width(group: &mut Group, cfg: &Config) {
    let min_len = cfg.regexp_min_len();
    for position in 0..group.tails_at_position.len() {
        let Some(chosen_id) = group.chosen_tail[position] else {
            continue;
        };
        let first_id = group.first_tail[position];
        let compound = group.state[position] == ChooseState::ChosenPlusFirstStart;
        let chosen_value = group.tail(chosen_id).value.clone();
        let chosen_simple = group.tail(chosen_id).simple_tail.clone();
        let first_value = first_id.map(|id| group.tail(id).value.clone());
        let first_simple = first_id.map(|id| group.tail(id).simple_tail.clone());

        let mut width_chosen = 0;
        let mut width_first = 0;
        for (idx, tail) in group.tails.iter().enumerate() {
            if TailId(idx) != chosen_id && tail.simple_tail == chosen_simple {
                let (_, prefix) =
                    values_match(tail.value.as_deref(), chosen_value.as_deref(), true);
                width_chosen = width_chosen.max(prefix);
            }
            if compound && first_id != Some(chosen_id) {
                if let (Some(fid), Some(fs), Some(fv)) =
                    (first_id, first_simple.as_ref(), first_value.as_ref())
                {
                    if TailId(idx) != fid && &tail.simple_tail == fs {
                        let (_, prefix) =
                            values_match(tail.value.as_deref(), fv.as_deref(), true);
                        width_first = width_first.max(prefix);
                    }
                }
            }
        }
        width_chosen = width_chosen.max(min_len);
        width_first = width_first.max(min_len);
        group.re_width_chosen[position] = width_chosen;
        group.re_width_first[position] = width_first;
        group.tails[chosen_id.0].value_re = chosen_value
            .as_deref()
            .map(|v| regexp_value(v, width_chosen));
        if compound {
            if let Some(fid) = first_id {
                if fid == chosen_id {
                    // One tail plays both roles; they share the cached body.
                } else {
                    group.tails[fid.0].value_re = first_value
                        .flatten()
                        .as_deref()
                        .map(|v| regexp_value(v, width_first));
                }
            }
        }
    }
}

/// Per distinct chosen simplified tail within the group, pad values to the
/// longest rendered length among the positions sharing that tail. Lengths
/// beyond `MAX_PRETTY_WIDTH` neither pad others out nor get padded.
fn choose_pretty_width(group: &mut Group, cfg: &Config) {
    let positions = group.tails_at_position.len();
    for position in 0..positions {
        let Some(chosen_id) = group.chosen_tail[position] else {
            continue;
        };
        let measured = if group.state[position] == ChooseState::ChosenPlusFirstStart {
            group.first_tail[position].unwrap_or(chosen_id)
        } else {
            chosen_id
        };
        let tail = group.tail(measured);
        let rendered = if cfg.regexp_enabled() {
            tail.value_re.as_deref()
        } else {
            tail.value_qq.as_deref()
        };
        // Measured in chars, the unit the emitter's `{:<width$}` pads by.
        group.pretty_width[position] = rendered.map_or(0, |v| v.chars().count());
    }
    for position in 0..positions {
        let Some(chosen_id) = group.chosen_tail[position] else {
            continue;
        };
        let chosen_simple = group.tail(chosen_id).simple_tail.clone();
        let mut max_width = 0;
        for pos_search in position..positions {
            let Some(other_id) = group.chosen_tail[pos_search] else {
                continue;
            };
            if group.tail(other_id).simple_tail == chosen_simple {
                let len = group.pretty_width[pos_search];
                if len <= MAX_PRETTY_WIDTH {
                    max_width = max_width.max(len);
                }
                group.pretty_width[pos_search] = max_width;
            }
        }
        group.pretty_width[position] = max_width.min(MAX_PRETTY_WIDTH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Entry;

    fn choose(list: &[(&str, Option<&str>)]) -> GroupSet {
        let cfg = Config::default();
        let mut entries: Vec<Entry> = list
            .iter()
            .map(|(path, value)| {
                Entry::new(path.to_string(), value.map(str::to_string), &cfg)
            })
            .collect();
        let mut groups = GroupSet::build(&mut entries, &cfg);
        choose_all(&mut groups, &cfg);
        groups
    }

    #[test]
    fn first_tail_skips_null_anchors() {
        let groups = choose(&[
            ("/files/etc/hosts/1", None),
            ("/files/etc/hosts/1/ipaddr", Some("127.0.0.1")),
        ]);
        let seq = &groups.groups[0];
        let idx = find_first_tail(seq, 1).expect("occupied");
        let tail = seq.tail(seq.tails_at_position[1][idx]);
        assert_eq!(tail.simple_tail, "/ipaddr");
        assert_eq!(tail.value.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn unique_first_tail_wins() {
        let groups = choose(&[
            ("/files/conf/acl[1]/setting", Some("localnet")),
            ("/files/conf/acl[2]/setting", Some("SSL_ports")),
        ]);
        let acl = &groups.groups[0];
        assert_eq!(acl.state[1], ChooseState::FirstTail);
        assert_eq!(acl.state[2], ChooseState::FirstTail);
        for position in 1..=2 {
            let first = acl.first_tail[position].expect("chosen");
            assert_eq!(acl.tail(first).value_found, 1);
        }
    }

    #[test]
    fn unique_tail_present_everywhere_is_chosen() {
        let groups = choose(&[
            ("/files/conf/acl[1]/type", Some("port")),
            ("/files/conf/acl[1]/setting", Some("SSL_ports")),
            ("/files/conf/acl[2]/type", Some("port")),
            ("/files/conf/acl[2]/setting", Some("Safe_ports")),
        ]);
        let acl = &groups.groups[0];
        assert_eq!(acl.state[1], ChooseState::ChosenTailStart);
        let chosen = acl.chosen_tail[1].expect("chosen");
        assert_eq!(acl.tail(chosen).simple_tail, "/setting");
    }

    #[test]
    fn second_tier_requires_presence_at_every_position() {
        // /port exists only under the second record, so it cannot carry
        // the predicate even though its value is unique.
        let groups = choose(&[
            ("/files/conf/acl[1]/type", Some("port")),
            ("/files/conf/acl[2]/type", Some("port")),
            ("/files/conf/acl[2]/port", Some("443")),
        ]);
        let acl = &groups.groups[0];
        assert_eq!(acl.state[2], ChooseState::FirstTailPlusPosition);
    }

    #[test]
    fn earlier_tail_with_same_path_shadows_a_candidate() {
        // blue is unique, but a predicate on x would bind the red
        // occurrence at the same position; both tiers 2 and 3 reject it
        // and the positions fall through to the ordinal.
        let groups = choose(&[
            ("/files/conf/item[1]/x[1]", Some("red")),
            ("/files/conf/item[1]/x[2]", Some("blue")),
            ("/files/conf/item[2]/x[1]", Some("red")),
            ("/files/conf/item[2]/x[2]", Some("green")),
        ]);
        let item = groups
            .groups
            .iter()
            .find(|g| g.head.ends_with("/item"))
            .expect("item group");
        assert_eq!(item.state[1], ChooseState::FirstTailPlusPosition);
        assert_eq!(item.state[2], ChooseState::FirstTailPlusPosition);
    }
}
