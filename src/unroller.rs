//! Unroll a score by expanding repeats and navigation jumps into a linear
//! measure sequence. The k-th appearance of a measure in that sequence is
//! its repeat index N = k, the pass its timemap offsets are recorded for.
//!
//! Handles:
//! - Forward / backward repeat signs
//! - Volta endings (`"1"`, `"1, 2"`, `"1-3"`)
//! - D.S. (dal segno) and D.C. (da capo)
//! - Fine: stop on the pass after a D.S./D.C. jump
//! - To Coda / Coda
//! - Senza ripetizione: repeats are not taken again after a jump

use std::collections::HashMap;

use crate::model::{Jump, MeasureData};

/// Expand measures (in document order) into play order.
///
/// Returns indices into `measures`; a repeated measure appears once per pass.
pub fn unroll(measures: &[&MeasureData]) -> Vec<usize> {
    if measures.is_empty() {
        return Vec::new();
    }

    // ── Pre-scan: segno and coda ────────────────────────────────────
    let segno_index = measures.iter().position(|m| m.segno);
    let coda_index = measures.iter().position(|m| m.coda);

    // ── Pre-scan: volta map (measure index → ending numbers) ────────
    let volta_map: HashMap<usize, Vec<i32>> = measures
        .iter()
        .enumerate()
        .filter_map(|(i, m)| m.ending.as_deref().map(|e| (i, parse_ending_numbers(e))))
        .collect();

    // ── Pre-scan: passes per repeat section ─────────────────────────
    // The highest ending number under a forward repeat decides how many
    // times the section is played; a plain repeat is played twice.
    let mut section_max_passes: HashMap<usize, i32> = HashMap::new();
    let mut current_forward = 0;
    for (i, m) in measures.iter().enumerate() {
        if m.repeat_start {
            current_forward = i;
        }
        if let Some(nums) = volta_map.get(&i) {
            let entry = section_max_passes.entry(current_forward).or_insert(2);
            if let Some(&max) = nums.iter().max() {
                *entry = (*entry).max(max);
            }
        }
    }

    // ── Walk ────────────────────────────────────────────────────────
    let mut result = Vec::new();
    let mut pos = 0;
    let mut repeat_start = 0;
    let mut repeat_pass = 1;
    let mut jump_taken = false;
    // A section with N endings is walked about N times.
    let max_iterations = measures.len() * 50;
    let mut iterations = 0;

    while pos < measures.len() {
        iterations += 1;
        if iterations > max_iterations {
            log::warn!(
                "unroller hit its safety limit ({max_iterations} iterations): {} measures, {} unrolled",
                measures.len(),
                result.len()
            );
            break;
        }

        let m = measures[pos];

        // Only the first pass sets the section start; later passes jump here.
        if m.repeat_start && repeat_pass == 1 {
            repeat_start = pos;
        }

        if let Some(nums) = volta_map.get(&pos) {
            if !nums.contains(&repeat_pass) {
                pos += 1;
                continue;
            }
        }

        if jump_taken && m.fine {
            result.push(pos);
            break;
        }

        if jump_taken && m.to_coda {
            if let Some(coda) = coda_index {
                pos = coda;
                jump_taken = false;
                continue;
            }
        }

        result.push(pos);

        if !jump_taken && m.repeat_end {
            let max_pass = section_max_passes.get(&repeat_start).copied().unwrap_or(2);
            if repeat_pass < max_pass {
                repeat_pass += 1;
                pos = repeat_start;
                continue;
            }
        }

        if !jump_taken {
            let target = match m.jump {
                Some(Jump::DalSegno) => segno_index,
                Some(Jump::DaCapo) => Some(0),
                None => None,
            };
            if let Some(target) = target {
                pos = target;
                jump_taken = true;
                repeat_pass = 1;
                continue;
            }
        }

        pos += 1;
        // Past the last ending of a finished section: back to pass 1, and
        // a later backward repeat without a forward sign returns here.
        if repeat_pass > 1 {
            let prev_closed_repeat = measures.get(pos - 1).is_some_and(|pm| pm.repeat_end);
            if prev_closed_repeat && !volta_map.contains_key(&pos) {
                repeat_pass = 1;
                repeat_start = pos;
            }
        }
    }

    result
}

/// Highest ending number taken from a document.
const MAX_ENDING_NUMBER: i32 = 32;

/// Parse `"1"`, `"1, 2"` or `"1-3"` into ending numbers. Numbers outside
/// `1..=MAX_ENDING_NUMBER` and reversed ranges are dropped; input with no
/// number at all counts as ending 1.
fn parse_ending_numbers(s: &str) -> Vec<i32> {
    let mut result = Vec::new();
    let mut numeric = false;
    for part in s.split([',', ' ']) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.parse::<i32>(), end.parse::<i32>()) {
                numeric = true;
                if start >= 1 && start <= end {
                    result.extend(start..=end.min(MAX_ENDING_NUMBER));
                }
                continue;
            }
        }
        if let Ok(n) = part.parse::<i32>() {
            numeric = true;
            if (1..=MAX_ENDING_NUMBER).contains(&n) {
                result.push(n);
            }
        }
    }
    if !numeric && !s.trim().is_empty() {
        result.push(1);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plain() -> MeasureData {
        MeasureData::default()
    }

    fn run(measures: &[MeasureData]) -> Vec<usize> {
        let refs: Vec<&MeasureData> = measures.iter().collect();
        unroll(&refs)
    }

    #[test]
    fn straight_through() {
        assert_eq!(run(&[plain(), plain(), plain()]), vec![0, 1, 2]);
        assert!(run(&[]).is_empty());
    }

    #[test]
    fn simple_repeat_plays_twice() {
        let measures = vec![
            plain(),
            MeasureData {
                repeat_start: true,
                ..plain()
            },
            MeasureData {
                repeat_end: true,
                ..plain()
            },
            plain(),
        ];
        assert_eq!(run(&measures), vec![0, 1, 2, 1, 2, 3]);
    }

    #[test]
    fn backward_repeat_without_forward_goes_to_start() {
        let measures = vec![
            plain(),
            MeasureData {
                repeat_end: true,
                ..plain()
            },
            plain(),
        ];
        assert_eq!(run(&measures), vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn first_and_second_endings() {
        let measures = vec![
            MeasureData {
                repeat_start: true,
                ..plain()
            },
            MeasureData {
                ending: Some("1".into()),
                repeat_end: true,
                ..plain()
            },
            MeasureData {
                ending: Some("2".into()),
                ..plain()
            },
            plain(),
        ];
        assert_eq!(run(&measures), vec![0, 1, 0, 2, 3]);
    }

    #[test]
    fn da_capo_al_fine_skips_repeats() {
        let measures = vec![
            MeasureData {
                repeat_start: true,
                ..plain()
            },
            MeasureData {
                repeat_end: true,
                fine: true,
                ..plain()
            },
            MeasureData {
                jump: Some(Jump::DaCapo),
                ..plain()
            },
        ];
        assert_eq!(run(&measures), vec![0, 1, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn dal_segno_to_coda() {
        let measures = vec![
            plain(),
            MeasureData {
                segno: true,
                ..plain()
            },
            MeasureData {
                to_coda: true,
                ..plain()
            },
            MeasureData {
                jump: Some(Jump::DalSegno),
                ..plain()
            },
            MeasureData {
                coda: true,
                ..plain()
            },
        ];
        assert_eq!(run(&measures), vec![0, 1, 2, 3, 1, 4]);
    }

    #[test]
    fn ending_numbers() {
        assert_eq!(parse_ending_numbers("1"), vec![1]);
        assert_eq!(parse_ending_numbers("1, 2"), vec![1, 2]);
        assert_eq!(parse_ending_numbers("1-3"), vec![1, 2, 3]);
        assert_eq!(parse_ending_numbers("last"), vec![1]);
        assert!(parse_ending_numbers("").is_empty());
    }

    #[test]
    fn out_of_range_endings_are_clamped() {
        assert_eq!(parse_ending_numbers("1-400000000").len(), 32);
        assert!(parse_ending_numbers("3-1").is_empty());
        assert!(parse_ending_numbers("0").is_empty());
        assert_eq!(parse_ending_numbers("0-2"), Vec::<i32>::new());
        assert_eq!(parse_ending_numbers("2, 99"), vec![2]);

        let measures = vec![
            MeasureData {
                ending: Some("1-400000000".into()),
                repeat_end: true,
                ..plain()
            },
            plain(),
        ];
        let order = run(&measures);
        assert_eq!(order.len(), 33);
        assert_eq!(order.last(), Some(&1));
    }
}
