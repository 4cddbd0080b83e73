use crate::config::Config;
use crate::path::{split_path, Segment};
use crate::value::{quote_value, values_match};

/// Index of a group within the `GroupSet` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupId(pub usize);

/// Index of a tail within its owning group's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailId(pub usize);

/// One parser result: an absolute path, its (nullable) value, and the
/// segment chain derived from the path.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub value: Option<String>,
    /// The value rendered as a quoted literal, computed once at ingest.
    pub value_qq: Option<String>,
    pub segments: Vec<Segment>,
}

impl Entry {
    pub fn new(path: String, value: Option<String>, cfg: &Config) -> Entry {
        let value_qq = value.as_deref().map(quote_value);
        let segments = split_path(&path, cfg);
        Entry {
            path,
            value,
            value_qq,
            segments,
        }
    }
}

/// How the predicate for a (group, position) is rendered, shared across the
/// emission of sibling entries at that position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChooseState {
    #[default]
    NotDone,
    /// The first tail uniquely identifies the record.
    FirstTail,
    /// A unique tail+value present at every position; the `count()=0`
    /// disjunct has not started yet.
    ChosenTailStart,
    /// Emitting lines before the record that defines the chosen tail.
    ChosenTailWip,
    /// The defining record has been emitted; plain form from here on.
    ChosenTailDone,
    /// First tail plus a tail unique within the first-tail subgroup.
    ChosenPlusFirstStart,
    ChosenPlusFirstWip,
    ChosenPlusFirstDone,
    /// Unavoidable duplicate: first tail plus the ordinal within the
    /// subgroup.
    FirstTailPlusPosition,
    /// No entries at this position; only a wildcard can be emitted.
    NoChildNodes,
}

/// A distinct (simplified tail, value) observation within a group, with
/// per-position tallies.
#[derive(Debug, Clone)]
pub struct Tail {
    pub simple_tail: String,
    pub value: Option<String>,
    pub value_qq: Option<String>,
    /// Regexp rendering of the value, cached by the width pass.
    pub value_re: Option<String>,
    /// How many entries at each position have this simplified tail,
    /// regardless of value.
    pub found_at: Vec<u32>,
    /// How many entries at each position match both simplified tail and
    /// value.
    pub value_found_at: Vec<u32>,
    /// Total of `value_found_at` across all positions.
    pub value_found: u32,
}

/// Within a group, the positions sharing one first-tail value. Materialised
/// lazily when disambiguation falls through to the subgroup tiers.
#[derive(Debug, Clone)]
pub struct Subgroup {
    pub first_tail: TailId,
    pub matching_positions: Vec<usize>,
}

/// All segments sharing one head, with the per-position bookkeeping the
/// chooser and emitter work from. Per-position vectors are indexed directly
/// by position; index 0 is occupied only by the unusual `[0]` selector.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub head: String,
    pub max_position: usize,
    /// Distinct tails in first-seen order.
    pub tails: Vec<Tail>,
    /// One element per entry observed at each position, in input order.
    pub tails_at_position: Vec<Vec<TailId>>,
    pub chosen_tail: Vec<Option<TailId>>,
    pub first_tail: Vec<Option<TailId>>,
    pub state: Vec<ChooseState>,
    pub subgroups: Vec<Subgroup>,
    /// 1-based ordinal of each position within its subgroup; 0 = unset.
    pub subgroup_position: Vec<usize>,
    pub pretty_width: Vec<usize>,
    pub re_width_chosen: Vec<usize>,
    pub re_width_first: Vec<usize>,
}

impl Group {
    pub fn tail(&self, id: TailId) -> &Tail {
        &self.tails[id.0]
    }

    /// Number of positions that have at least one entry.
    pub fn occupied_positions(&self) -> usize {
        self.tails_at_position.iter().filter(|t| !t.is_empty()).count()
    }

    fn ensure_positions(&mut self, max_position: usize) {
        let need = max_position + 1;
        if self.tails_at_position.len() >= need {
            return;
        }
        self.tails_at_position.resize_with(need, Vec::new);
        self.chosen_tail.resize(need, None);
        self.first_tail.resize(need, None);
        self.state.resize(need, ChooseState::NotDone);
        self.subgroup_position.resize(need, 0);
        self.pretty_width.resize(need, 0);
        self.re_width_chosen.resize(need, 0);
        self.re_width_first.resize(need, 0);
        for tail in &mut self.tails {
            tail.found_at.resize(need, 0);
            tail.value_found_at.resize(need, 0);
        }
    }

    /// Record one (simplified tail, value) observation at `position`.
    fn add_observation(
        &mut self,
        position: usize,
        simple_tail: &str,
        value: Option<&str>,
        value_qq: Option<&str>,
        regexp: bool,
    ) {
        if position > self.max_position {
            self.max_position = position;
        }
        self.ensure_positions(self.max_position);
        let tail = self.find_or_create_tail(position, simple_tail, value, value_qq, regexp);
        self.tails_at_position[position].push(tail);
    }

    /// Find a tail matching both simplified tail and value, bumping the
    /// presence tally on every tail that shares the simplified tail. A new
    /// value variant inherits the presence tally of the most recently seen
    /// same-tail variant, so "how often is this tail present" carries
    /// across values.
    fn find_or_create_tail(
        &mut self,
        position: usize,
        simple_tail: &str,
        value: Option<&str>,
        value_qq: Option<&str>,
        regexp: bool,
    ) -> TailId {
        let mut found_tail = None;
        let mut found_tail_value = None;
        let mut found_this_pos = 1;
        for (idx, tail) in self.tails.iter_mut().enumerate() {
            if tail.simple_tail == simple_tail {
                tail.found_at[position] += 1;
                found_this_pos = tail.found_at[position];
                let (matches, _) = values_match(tail.value.as_deref(), value, regexp);
                if matches {
                    tail.value_found_at[position] += 1;
                    tail.value_found += 1;
                    found_tail_value = Some(idx);
                }
                found_tail = Some(idx);
            }
        }
        if let Some(idx) = found_tail_value {
            return TailId(idx);
        }
        let positions = self.tails_at_position.len();
        let mut tail = Tail {
            simple_tail: simple_tail.to_string(),
            value: value.map(str::to_string),
            value_qq: value_qq.map(str::to_string),
            value_re: None,
            found_at: vec![0; positions],
            value_found_at: vec![0; positions],
            value_found: 1,
        };
        if let Some(idx) = found_tail {
            tail.found_at.copy_from_slice(&self.tails[idx].found_at);
        }
        tail.found_at[position] = found_this_pos;
        tail.value_found_at[position] = 1;
        self.tails.push(tail);
        TailId(self.tails.len() - 1)
    }

    /// Fetch or build the subgroup keyed by `first_tail`, collecting every
    /// position at which that tail appears and recording each position's
    /// 1-based ordinal within the subgroup.
    pub fn find_or_create_subgroup(&mut self, first_tail: TailId) -> usize {
        if let Some(idx) = self
            .subgroups
            .iter()
            .position(|sg| sg.first_tail == first_tail)
        {
            return idx;
        }
        let mut matching_positions = Vec::new();
        for position in 1..=self.max_position {
            if self.tails_at_position[position]
                .iter()
                .any(|&t| t == first_tail)
            {
                matching_positions.push(position);
                self.subgroup_position[position] = matching_positions.len();
            }
        }
        self.subgroups.push(Subgroup {
            first_tail,
            matching_positions,
        });
        self.subgroups.len() - 1
    }
}

/// Arena of groups, looked up linearly by head (groups are few).
#[derive(Debug, Clone, Default)]
pub struct GroupSet {
    pub groups: Vec<Group>,
}

impl GroupSet {
    /// Stage 3: bucket every positioned segment by head and tally its
    /// (simplified tail, value) under the owning group. Fills in each
    /// segment's group back-reference.
    pub fn build(entries: &mut [Entry], cfg: &Config) -> GroupSet {
        let mut set = GroupSet::default();
        let regexp = cfg.regexp_enabled();
        for entry in entries.iter_mut() {
            let Entry {
                segments,
                value,
                value_qq,
                ..
            } = entry;
            for segment in segments.iter_mut() {
                let Some(position) = segment.position else {
                    continue;
                };
                let gid = set.find_or_create(&segment.head);
                segment.group = Some(gid);
                set.groups[gid.0].add_observation(
                    position,
                    &segment.simple_tail,
                    value.as_deref(),
                    value_qq.as_deref(),
                    regexp,
                );
            }
        }
        set
    }

    fn find_or_create(&mut self, head: &str) -> GroupId {
        if let Some(idx) = self.groups.iter().position(|g| g.head == head) {
            return GroupId(idx);
        }
        self.groups.push(Group {
            head: head.to_string(),
            ..Group::default()
        });
        GroupId(self.groups.len() - 1)
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(list: &[(&str, Option<&str>)]) -> (Vec<Entry>, GroupSet) {
        let cfg = Config::default();
        let mut entries: Vec<Entry> = list
            .iter()
            .map(|(path, value)| {
                Entry::new(path.to_string(), value.map(str::to_string), &cfg)
            })
            .collect();
        let groups = GroupSet::build(&mut entries, &cfg);
        (entries, groups)
    }

    #[test]
    fn segments_point_back_at_their_group() {
        let (entries, groups) = build(&[("/files/conf/acl[1]/type", Some("src"))]);
        let segment = &entries[0].segments[0];
        let gid = segment.group.expect("positioned segment joins a group");
        assert_eq!(groups.group(gid).head, "/files/conf/acl");
        assert!(entries[0].segments[1].group.is_none());
    }

    #[test]
    fn tallies_stay_consistent_per_position() {
        let (_, groups) = build(&[
            ("/files/conf/acl[1]/type", Some("src")),
            ("/files/conf/acl[1]/setting", Some("localnet")),
            ("/files/conf/acl[2]/type", Some("port")),
        ]);
        let acl = &groups.groups[0];
        for position in 1..=2 {
            let sum: u32 = acl
                .tails
                .iter()
                .map(|t| t.value_found_at[position])
                .sum();
            assert_eq!(sum as usize, acl.tails_at_position[position].len());
        }
        for tail in &acl.tails {
            let total: u32 = tail.value_found_at.iter().sum();
            assert_eq!(total, tail.value_found);
        }
    }

    #[test]
    fn presence_tally_carries_to_new_value_variants() {
        let (_, groups) = build(&[
            ("/files/conf/acl[1]/type", Some("src")),
            ("/files/conf/acl[2]/type", Some("port")),
        ]);
        let acl = &groups.groups[0];
        let port = acl
            .tails
            .iter()
            .find(|t| t.value.as_deref() == Some("port"))
            .expect("port variant");
        // Inherited from the src variant: the /type tail is known to be
        // present at position 1 even though the value there differs.
        assert_eq!(port.found_at[1], 1);
        assert_eq!(port.found_at[2], 1);
        assert_eq!(port.value_found_at[1], 0);
        assert_eq!(port.value_found_at[2], 1);
    }

    #[test]
    fn subgroup_records_matching_positions_and_ordinals() {
        let (_, mut groups) = build(&[
            ("/files/conf/dir[1]/client", Some("hostA")),
            ("/files/conf/dir[2]/client", Some("hostA")),
        ]);
        let dir = &mut groups.groups[0];
        let tail = dir.tails_at_position[1][0];
        let sg = dir.find_or_create_subgroup(tail);
        assert_eq!(dir.subgroups[sg].matching_positions, vec![1, 2]);
        assert_eq!(dir.subgroup_position[1], 1);
        assert_eq!(dir.subgroup_position[2], 2);
        // The same key fetches the same subgroup.
        assert_eq!(dir.find_or_create_subgroup(tail), sg);
    }
}
