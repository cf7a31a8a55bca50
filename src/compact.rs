//! Graph compactor
//!
//! A source container is a graph of binary structures connected by embedded
//! segment-relative pointers: display lists (runs of 8-byte big-endian
//! commands) referencing sub-lists, vertex blocks, matrices, and textures.
//! Only structures reachable from the caller's selected roots are needed in
//! the output, and reachable spans are frequently byte-identical across roots
//! (shared geometry and material blocks), so they are stored once.
//!
//! Node identity is "offset within the container", never an in-memory
//! reference: the visited set and the relocation map are both keyed by
//! original byte offset, which guarantees at most one copy per distinct
//! offset regardless of how many roots or pointers reach it, and terminates
//! cyclic pointer graphs.

use ahash::AHashMap;
use std::collections::VecDeque;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Traversal depth bound used by the runtime pipeline
pub const DEFAULT_MAX_DEPTH: u32 = 6;

/// Segment number for container-internal addresses
const SEG_OBJECT: u8 = 0x06;

// Display-list opcodes that carry or terminate structure
const G_VTX: u8 = 0x01;
const G_MTX: u8 = 0xDA;
const G_DL: u8 = 0xDE;
const G_ENDDL: u8 = 0xDF;
const G_LOADTLUT: u8 = 0xF0;
const G_LOADBLOCK: u8 = 0xF3;
const G_SETTIMG: u8 = 0xFD;

/// Structural extent of a worklist node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanKind {
    /// Commands up to and including the terminator; length discovered by scan
    DisplayList,
    /// Opaque data block with an explicit byte length
    Data(usize),
}

#[derive(Debug, Clone, Copy)]
struct WorkItem {
    offset: u32,
    kind: SpanKind,
    depth: u32,
}

/// Result of one compaction pass
#[derive(Debug, Clone)]
pub struct CompactResult {
    /// Minimized container, padded to a 16-byte boundary
    pub container: Vec<u8>,

    /// Original absolute offset to new absolute offset, for every visited span
    pub relocations: AHashMap<u32, u32>,
}

/// Compact the spans reachable from `roots` into a new container.
///
/// Roots are treated as display lists seeded at `start_depth`; every pointer
/// discovered at depth `d` enqueues its target at `d + 1` unless
/// `d + 1 > max_depth`, in which case the branch stops and the pointer is left
/// byte-for-byte unchanged (stale original segmented address). Pointers whose
/// targets fall outside the container are never followed and never fatal.
///
/// With `dedupe` set, spans whose exact bytes match an already-written span
/// reuse its new offset instead of being copied again; the relocation map then
/// sends multiple original offsets to one output copy.
pub fn compact(
    container: &[u8],
    roots: &[u32],
    start_depth: u32,
    max_depth: u32,
    dedupe: bool,
) -> CompactResult {
    let mut out: Vec<u8> = Vec::new();
    let mut relocations: AHashMap<u32, u32> = AHashMap::new();
    // content key -> new offset of the first copy with those bytes
    let mut seen_spans: AHashMap<u64, u32> = AHashMap::new();
    // display-list copies that need their pointer words rewritten in pass two
    let mut copied_lists: Vec<(usize, usize)> = Vec::new();
    let mut dedup_hits = 0usize;

    let mut work: VecDeque<WorkItem> = roots
        .iter()
        .map(|&offset| WorkItem {
            offset,
            kind: SpanKind::DisplayList,
            depth: start_depth,
        })
        .collect();

    while let Some(item) = work.pop_front() {
        if relocations.contains_key(&item.offset) {
            continue;
        }
        let start = item.offset as usize;
        if start >= container.len() {
            debug!(offset = item.offset, "skipping out-of-bounds span");
            continue;
        }
        let len = match item.kind {
            SpanKind::DisplayList => display_list_len(container, start),
            SpanKind::Data(len) => {
                if start + len > container.len() {
                    debug!(offset = item.offset, len, "skipping truncated data span");
                    continue;
                }
                len
            }
        };
        let span = &container[start..start + len];

        let key = dedupe.then(|| span_key(span, item.kind));
        if let Some(key) = key {
            if let Some(&existing) = seen_spans.get(&key) {
                let end = existing as usize + span.len();
                if end <= out.len() && &out[existing as usize..end] == span {
                    // identical content already written; its pointees were
                    // enqueued when the first copy was scanned
                    relocations.insert(item.offset, existing);
                    dedup_hits += 1;
                    continue;
                }
            }
        }

        pad_to(&mut out, 8);
        let new_offset = out.len() as u32;
        out.extend_from_slice(span);
        relocations.insert(item.offset, new_offset);
        if let Some(key) = key {
            seen_spans.insert(key, new_offset);
        }

        if item.kind == SpanKind::DisplayList {
            copied_lists.push((new_offset as usize, span.len()));
            if item.depth + 1 <= max_depth {
                for (target, kind) in scan_pointers(span, container.len()) {
                    work.push_back(WorkItem {
                        offset: target,
                        kind,
                        depth: item.depth + 1,
                    });
                }
            }
        }
    }

    for &(start, len) in &copied_lists {
        patch_pointers(&mut out, start, len, &relocations);
    }

    pad_to(&mut out, 16);

    debug!(
        spans = relocations.len(),
        dedup_hits,
        output_len = out.len(),
        "compaction complete"
    );

    CompactResult {
        container: out,
        relocations,
    }
}

/// Byte length of the display list starting at `start`: commands up to and
/// including `G_ENDDL`, or a branching `G_DL` (flag byte 0x01), truncated at
/// the buffer end if unterminated.
fn display_list_len(container: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos + 8 <= container.len() {
        let op = container[pos];
        if op == G_ENDDL || (op == G_DL && container[pos + 1] == 0x01) {
            return pos + 8 - start;
        }
        pos += 8;
    }
    container.len() - start
}

/// Content key for dedup: xxh3 over the span bytes, seeded by the span kind
/// so a data block never aliases a byte-identical display list (the latter
/// gets its pointer words rewritten, the former must not).
fn span_key(span: &[u8], kind: SpanKind) -> u64 {
    let seed = match kind {
        SpanKind::DisplayList => 0,
        SpanKind::Data(_) => 1,
    };
    xxh3_64_with_seed(span, seed)
}

/// Discover the container-internal pointers inside one display-list span.
///
/// Only segment-0x06 addresses are container-internal; all other segments
/// belong to external RAM and are ignored. Targets whose extent would run
/// past `bounds` are dropped here (defensive, never fatal).
fn scan_pointers(span: &[u8], bounds: usize) -> Vec<(u32, SpanKind)> {
    let mut children = Vec::new();
    let count = span.len() / 8;

    for index in 0..count {
        let cmd = &span[index * 8..index * 8 + 8];
        let word0 = u32::from_be_bytes([cmd[0], cmd[1], cmd[2], cmd[3]]);
        let word1 = u32::from_be_bytes([cmd[4], cmd[5], cmd[6], cmd[7]]);
        if (word1 >> 24) as u8 != SEG_OBJECT {
            continue;
        }
        let target = word1 & 0x00FF_FFFF;

        match cmd[0] {
            G_DL => {
                if (target as usize) < bounds {
                    children.push((target, SpanKind::DisplayList));
                }
            }
            G_VTX => {
                let len = (((word0 >> 12) & 0xFF) as usize) * 0x10;
                if len > 0 && target as usize + len <= bounds {
                    children.push((target, SpanKind::Data(len)));
                }
            }
            G_MTX => {
                if target as usize + 0x40 <= bounds {
                    children.push((target, SpanKind::Data(0x40)));
                }
            }
            G_SETTIMG => {
                if let Some(len) = texture_len(span, index, word0) {
                    if len > 0 && target as usize + len <= bounds {
                        children.push((target, SpanKind::Data(len)));
                    }
                }
            }
            _ => {}
        }
    }
    children
}

/// Byte length of the texture referenced by the `G_SETTIMG` at `cmd_index`,
/// derived from its texel-size bits and the next load command in the same
/// list. No sizing command before the next image pointer means the texture
/// cannot be measured and is not followed.
fn texture_len(span: &[u8], cmd_index: usize, settimg_word0: u32) -> Option<usize> {
    let siz = ((settimg_word0 >> 19) & 0x3) as usize;
    let count = span.len() / 8;

    for index in cmd_index + 1..count {
        let cmd = &span[index * 8..index * 8 + 8];
        let word1 = u32::from_be_bytes([cmd[4], cmd[5], cmd[6], cmd[7]]);
        match cmd[0] {
            G_SETTIMG => return None,
            G_LOADBLOCK => {
                let texels = (((word1 >> 12) & 0xFFF) + 1) as usize;
                // 4 << siz bits per texel
                return Some(((texels << siz) + 1) >> 1);
            }
            G_LOADTLUT => {
                let entries = (((word1 >> 14) & 0x3FF) + 1) as usize;
                return Some(entries * 2);
            }
            _ => {}
        }
    }
    None
}

/// Rewrite segment-0x06 pointer words inside one copied display list through
/// the completed relocation map. Unvisited targets keep their original bytes.
fn patch_pointers(out: &mut [u8], start: usize, len: usize, relocations: &AHashMap<u32, u32>) {
    let count = len / 8;
    for index in 0..count {
        let pos = start + index * 8;
        let op = out[pos];
        if !matches!(op, G_DL | G_VTX | G_MTX | G_SETTIMG) {
            continue;
        }
        let word1 = u32::from_be_bytes([out[pos + 4], out[pos + 5], out[pos + 6], out[pos + 7]]);
        if (word1 >> 24) as u8 != SEG_OBJECT {
            continue;
        }
        if let Some(&new_offset) = relocations.get(&(word1 & 0x00FF_FFFF)) {
            let patched = (u32::from(SEG_OBJECT) << 24) | new_offset;
            out[pos + 4..pos + 8].copy_from_slice(&patched.to_be_bytes());
        }
    }
}

fn pad_to(out: &mut Vec<u8>, align: usize) {
    let rem = out.len() % align;
    if rem != 0 {
        out.resize(out.len() + align - rem, 0);
    }
}
