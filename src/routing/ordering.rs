//! Route specificity ordering.
//!
//! Applied once per verb at startup so that more specific patterns are tried
//! before more general ones:
//! 1. The literal root `/` sorts last.
//! 2. More segments sort first.
//! 3. Segment by segment, literals before `*`; two literals compare lexically.
//! 4. On a full tie, a pattern ending in `*` sorts after one that does not.
//!
//! Remaining ties keep registration order (the sort is stable).

use std::cmp::Ordering;

use super::pattern::{PathPattern, Segment};

pub fn compare_patterns(a: &PathPattern, b: &PathPattern) -> Ordering {
    match (a.is_root(), b.is_root()) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (true, true) => return Ordering::Equal,
        (false, false) => {}
    }

    let by_depth = b.segments().len().cmp(&a.segments().len());
    if by_depth != Ordering::Equal {
        return by_depth;
    }

    for (sa, sb) in a.segments().iter().zip(b.segments()) {
        let ord = match (sa, sb) {
            (Segment::Literal(x), Segment::Literal(y)) => x.cmp(y),
            (Segment::Literal(_), Segment::Wildcard) => Ordering::Less,
            (Segment::Wildcard, Segment::Literal(_)) => Ordering::Greater,
            (Segment::Wildcard, Segment::Wildcard) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    a.ends_with_wildcard().cmp(&b.ends_with_wildcard())
}

/// Stable in-place sort by pattern specificity.
pub fn sort_by_specificity<T>(items: &mut [T], pattern: impl Fn(&T) -> &PathPattern) {
    items.sort_by(|a, b| compare_patterns(pattern(a), pattern(b)));
}
