use crate::box_tree::BoxHandle;

const BITS: u32 = 8;
const BUCKETS: usize = 1 << BITS;
// 32-bit indices, one digit per pass.
const PASSES: u32 = 4;

/// LSD radix sort over the handle index: count, prefix-sum, scatter,
/// ping-ponging between two buffers. An even pass count lands the
/// sorted data back in the original allocation.
pub(crate) fn sort_handles(handles: &mut Vec<BoxHandle>) {
    let n = handles.len();
    if n <= 1 {
        return;
    }
    let mut src = std::mem::take(handles);
    let mut dst = vec![BoxHandle(0); n];
    for pass in 0..PASSES {
        let shift = BITS * pass;
        let mut counts = [0usize; BUCKETS + 1];
        for h in &src {
            let digit = (h.0 >> shift) as usize & (BUCKETS - 1);
            counts[digit + 1] += 1;
        }
        for bucket in 0..BUCKETS {
            counts[bucket + 1] += counts[bucket];
        }
        for h in &src {
            let digit = (h.0 >> shift) as usize & (BUCKETS - 1);
            dst[counts[digit]] = *h;
            counts[digit] += 1;
        }
        std::mem::swap(&mut src, &mut dst);
    }
    *handles = src;
}
