// (c) Roel Kluin, 2023, GPL v3

use crate::error::LtrError;
use anyhow::{ensure, Context, Result};
use bitvec::prelude::*;
use memmap2::{Mmap, MmapMut};
use num_traits::{FromPrimitive, PrimInt, ToPrimitive, Unsigned};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::mem::size_of;

/// Slot width, fixed when the space is constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotWidth {
    U32,
    U64,
}

impl SlotWidth {
    /// 32 bits if allowed and every value below maxvalue fits.
    pub fn for_maxvalue(maxvalue: u64, useuint: bool) -> Self {
        if useuint && maxvalue <= u64::from(u32::MAX) {
            SlotWidth::U32
        } else {
            SlotWidth::U64
        }
    }
    pub fn bytes(&self) -> usize {
        match self {
            SlotWidth::U32 => size_of::<u32>(),
            SlotWidth::U64 => size_of::<u64>(),
        }
    }
}

trait Slot: PrimInt + Unsigned + FromPrimitive + ToPrimitive {
    fn write_ne<W: Write>(self, out: &mut W) -> std::io::Result<()>;
}

impl Slot for u32 {
    fn write_ne<W: Write>(self, out: &mut W) -> std::io::Result<()> {
        out.write_all(&self.to_ne_bytes())
    }
}

impl Slot for u64 {
    fn write_ne<W: Write>(self, out: &mut W) -> std::io::Result<()> {
        out.write_all(&self.to_ne_bytes())
    }
}

#[inline]
fn read_slot<T: Slot>(slots: &[T], idx: usize) -> u64 {
    slots[idx].to_u64().unwrap_or(u64::MAX)
}

#[inline]
fn write_slot<T: Slot>(slots: &mut [T], idx: usize, value: u64) -> Result<()> {
    slots[idx] = T::from_u64(value).ok_or_else(|| {
        LtrError::InvariantViolation(format!("value {} does not fit the slot width", value))
    })?;
    Ok(())
}

fn cast<T: Slot>(bytes: &[u8]) -> &[T] {
    // SAFETY: u32 and u64 have no invalid bit patterns; mappings are page aligned.
    let (head, slots, _) = unsafe { bytes.align_to::<T>() };
    dbg_assert!(head.is_empty());
    slots
}

fn cast_mut<T: Slot>(bytes: &mut [u8]) -> &mut [T] {
    // SAFETY: as above.
    let (head, slots, _) = unsafe { bytes.align_to_mut::<T>() };
    dbg_assert!(head.is_empty());
    slots
}

enum Backing {
    U32(Vec<u32>),
    U64(Vec<u64>),
    Mapped(MmapMut),
    MappedReadOnly(Mmap),
}

/// Raw width-typed view on the slots, e.g. for an external sort of a bucket.
pub enum ExportPtr<'a> {
    U32(&'a mut [u32]),
    U64(&'a mut [u64]),
}

enum Slots<'a> {
    U32(&'a [u32]),
    U64(&'a [u64]),
}

/// Suffix start positions, stored in 32 or 64 bits per slot, in memory or in a
/// file mapped by a single writer or by any number of readers.
pub struct SuffixSortSpace {
    backing: Backing,
    width: SlotWidth,
    numofentries: u64,
    maxvalue: u64,
    bucketleftidx: u64,
    partoffset: u64,
    longest: Option<u64>,
    longest_updates: u32,
}

impl SuffixSortSpace {
    pub fn new(numofentries: u64, maxvalue: u64, useuint: bool) -> Result<Self> {
        let width = SlotWidth::for_maxvalue(maxvalue, useuint);
        let n = usize::try_from(numofentries)
            .map_err(|_| LtrError::alloc("suffix table", numofentries))?;
        let backing = match width {
            SlotWidth::U32 => {
                let mut v: Vec<u32> = Vec::new();
                v.try_reserve_exact(n)
                    .map_err(|_| LtrError::alloc("suffix table", numofentries))?;
                v.resize(n, 0);
                Backing::U32(v)
            }
            SlotWidth::U64 => {
                let mut v: Vec<u64> = Vec::new();
                v.try_reserve_exact(n)
                    .map_err(|_| LtrError::alloc("suffix table", numofentries))?;
                v.resize(n, 0);
                Backing::U64(v)
            }
        };
        Ok(SuffixSortSpace::with_backing(backing, width, numofentries, maxvalue))
    }

    /// Map the slots on an open file. The file is sized to fit; when it already
    /// has that size its contents are the initial slot values. Only one
    /// SuffixSortSpace may map a file for writing at a time.
    pub fn from_file(file: &File, numofentries: u64, maxvalue: u64, useuint: bool) -> Result<Self> {
        let width = SlotWidth::for_maxvalue(maxvalue, useuint);
        if numofentries == 0 {
            return SuffixSortSpace::new(0, maxvalue, useuint);
        }
        let bytes = numofentries
            .checked_mul(width.bytes() as u64)
            .ok_or_else(|| LtrError::alloc("suffix table file", numofentries))?;
        if file.metadata()?.len() != bytes {
            file.set_len(bytes)
                .with_context(|| LtrError::alloc("suffix table file", numofentries))?;
        }
        // SAFETY: the mapping is private to this object; single writer.
        let map = unsafe { MmapMut::map_mut(file) }
            .with_context(|| LtrError::alloc("suffix table mapping", numofentries))?;
        ensure!(map.as_ptr() as usize % size_of::<u64>() == 0, "unaligned mapping");
        Ok(SuffixSortSpace::with_backing(
            Backing::Mapped(map),
            width,
            numofentries,
            maxvalue,
        ))
    }

    /// Map a written suffix table for reading only. The file must have exactly
    /// the size of numofentries slots; it is never resized or written.
    pub fn from_file_readonly(file: &File, numofentries: u64, maxvalue: u64, useuint: bool) -> Result<Self> {
        let width = SlotWidth::for_maxvalue(maxvalue, useuint);
        let bytes = numofentries
            .checked_mul(width.bytes() as u64)
            .ok_or_else(|| LtrError::alloc("suffix table file", numofentries))?;
        let len = file.metadata()?.len();
        ensure!(len == bytes, "suffix table has {} bytes, expected {}", len, bytes);
        if numofentries == 0 {
            return SuffixSortSpace::new(0, maxvalue, useuint);
        }
        // SAFETY: read only; writers of the file must not run alongside.
        let map = unsafe { Mmap::map(file) }
            .with_context(|| LtrError::alloc("suffix table mapping", numofentries))?;
        ensure!(map.as_ptr() as usize % size_of::<u64>() == 0, "unaligned mapping");
        Ok(SuffixSortSpace::with_backing(
            Backing::MappedReadOnly(map),
            width,
            numofentries,
            maxvalue,
        ))
    }

    fn with_backing(backing: Backing, width: SlotWidth, numofentries: u64, maxvalue: u64) -> Self {
        dbg_print!(
            "suffix sort space: {} entries of {:?}, maxvalue {}",
            numofentries,
            width,
            maxvalue
        );
        SuffixSortSpace {
            backing,
            width,
            numofentries,
            maxvalue,
            bucketleftidx: 0,
            partoffset: 0,
            longest: None,
            longest_updates: 0,
        }
    }

    /// Bytes needed for a space of this size.
    pub fn required_space(numofentries: u64, maxvalue: u64, useuint: bool) -> usize {
        let width = SlotWidth::for_maxvalue(maxvalue, useuint);
        size_of::<SuffixSortSpace>() + numofentries as usize * width.bytes()
    }

    pub fn width(&self) -> SlotWidth {
        self.width
    }
    pub fn len(&self) -> u64 {
        self.numofentries
    }
    pub fn is_empty(&self) -> bool {
        self.numofentries == 0
    }
    pub fn maxvalue(&self) -> u64 {
        self.maxvalue
    }
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_) | Backing::MappedReadOnly(_))
    }
    pub fn is_readonly(&self) -> bool {
        matches!(self.backing, Backing::MappedReadOnly(_))
    }

    fn slots(&self) -> Slots<'_> {
        match &self.backing {
            Backing::U32(v) => Slots::U32(v),
            Backing::U64(v) => Slots::U64(v),
            Backing::Mapped(map) => match self.width {
                SlotWidth::U32 => Slots::U32(cast(map)),
                SlotWidth::U64 => Slots::U64(cast(map)),
            },
            Backing::MappedReadOnly(map) => match self.width {
                SlotWidth::U32 => Slots::U32(cast(map)),
                SlotWidth::U64 => Slots::U64(cast(map)),
            },
        }
    }

    fn slots_mut(&mut self) -> Result<ExportPtr<'_>> {
        Ok(match &mut self.backing {
            Backing::U32(v) => ExportPtr::U32(v),
            Backing::U64(v) => ExportPtr::U64(v),
            Backing::Mapped(map) => match self.width {
                SlotWidth::U32 => ExportPtr::U32(cast_mut(map)),
                SlotWidth::U64 => ExportPtr::U64(cast_mut(map)),
            },
            Backing::MappedReadOnly(_) => {
                let msg = "suffix table is mapped read only".to_string();
                return Err(LtrError::InvariantViolation(msg).into());
            }
        })
    }

    pub fn get_direct(&self, idx: u64) -> u64 {
        match self.slots() {
            Slots::U32(s) => read_slot(s, idx as usize),
            Slots::U64(s) => read_slot(s, idx as usize),
        }
    }

    /// Values must be below maxvalue.
    pub fn set_direct(&mut self, idx: u64, value: u64) -> Result<()> {
        if value >= self.maxvalue {
            return Err(LtrError::InvariantViolation(format!(
                "slot {}: {} >= maxvalue {}",
                idx, value, self.maxvalue
            ))
            .into());
        }
        match self.slots_mut()? {
            ExportPtr::U32(s) => write_slot(s, idx as usize, value),
            ExportPtr::U64(s) => write_slot(s, idx as usize, value),
        }
    }

    #[inline]
    fn local(&self, subbucketleft: u64, idx: u64) -> u64 {
        dbg_assert!(subbucketleft + idx >= self.bucketleftidx);
        subbucketleft + idx - self.bucketleftidx
    }

    /// Value at idx within the (sub)bucket starting at subbucketleft.
    pub fn get(&self, subbucketleft: u64, idx: u64) -> u64 {
        self.get_direct(self.local(subbucketleft, idx))
    }

    pub fn set(&mut self, subbucketleft: u64, idx: u64, value: u64) -> Result<()> {
        let local = self.local(subbucketleft, idx);
        self.set_direct(local, value)
    }

    /// Global index of the first stored slot, when the space holds part of a table.
    pub fn bucketleftidx(&self) -> u64 {
        self.bucketleftidx
    }
    pub fn set_bucketleftidx(&mut self, value: u64) {
        self.bucketleftidx = value;
    }
    pub fn set_partoffset(&mut self, partoffset: u64) {
        self.partoffset = partoffset;
    }
    pub fn no_offsets(&self) -> bool {
        self.bucketleftidx == 0 && self.partoffset == 0
    }

    /// Record that slot idx (relative to bucketleftidx) holds suffix 0.
    pub fn update_longest(&mut self, idx: u64) {
        self.longest = Some(self.bucketleftidx + idx + self.partoffset);
        self.longest_updates += 1;
    }
    pub fn longest(&self) -> Option<u64> {
        self.longest
    }

    /// Slots from subbucketleft to the end, width-typed.
    pub fn export_mut(&mut self, subbucketleft: u64) -> Result<ExportPtr<'_>> {
        let from = self.local(subbucketleft, 0) as usize;
        Ok(match self.slots_mut()? {
            ExportPtr::U32(s) => ExportPtr::U32(&mut s[from..]),
            ExportPtr::U64(s) => ExportPtr::U64(&mut s[from..]),
        })
    }

    pub fn show_range(&self, subbucketleft: u64, width: u64) -> String {
        let mut s = String::new();
        for idx in 0..width {
            let _ = writeln!(s, "{}\t{}", subbucketleft + idx, self.get(subbucketleft, idx));
        }
        s
    }

    /// Write the first numberofsuffixes slots as fixed width integers in native
    /// byte order. The width is not recorded in the output.
    pub fn to_file<W: Write>(&self, out: &mut W, numberofsuffixes: u64) -> Result<()> {
        ensure!(
            numberofsuffixes <= self.numofentries,
            "cannot write {} of {} suffixes",
            numberofsuffixes,
            self.numofentries
        );
        let n = numberofsuffixes as usize;
        let written = match self.slots() {
            Slots::U32(s) => s[..n].iter().try_for_each(|v| v.write_ne(out)),
            Slots::U64(s) => s[..n].iter().try_for_each(|v| v.write_ne(out)),
        };
        written.context("writing suffix table")
    }

    /// Every stored value is below maxvalue and occurs at most once.
    pub fn verify_distinct(&self) -> Result<()> {
        let mut seen = bitvec![0; self.maxvalue as usize];
        for idx in 0..self.numofentries {
            let value = self.get_direct(idx);
            if value >= self.maxvalue || seen[value as usize] {
                return Err(LtrError::InvariantViolation(format!(
                    "slot {} holds {} (maxvalue {}, seen before: {})",
                    idx,
                    value,
                    self.maxvalue,
                    value < self.maxvalue
                ))
                .into());
            }
            seen.set(value as usize, true);
        }
        Ok(())
    }

    /// Flush a mapped table and, if requested, check that the slot of suffix 0
    /// was recorded exactly once.
    pub fn close(self, checklongestdefined: bool) -> Result<()> {
        if let Backing::Mapped(map) = &self.backing {
            map.flush().context("flushing suffix table")?;
        }
        if checklongestdefined && self.longest_updates != 1 {
            return Err(LtrError::InvariantViolation(format!(
                "longest suffix recorded {} times",
                self.longest_updates
            ))
            .into());
        }
        Ok(())
    }
}
