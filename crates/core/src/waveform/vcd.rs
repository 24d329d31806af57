//! Value Change Dump (IEEE 1364) encoding.

use std::io::{self, Write};

use crate::model::SignalDecl;

/// First printable character usable in an identifier code.
const ID_FIRST: u8 = b'!';
/// Number of printable characters usable in an identifier code (`!`..=`~`).
const ID_RADIX: usize = 94;

/// Time unit written to the header; one tick is one unit.
pub const TIMESCALE: &str = "1ns";

/// Scope all signals are declared under.
pub const TOP_SCOPE: &str = "top";

/// Returns the short identifier code for the signal at `index`.
#[allow(clippy::cast_possible_truncation)]
pub fn identifier(mut index: usize) -> String {
    let mut code = Vec::new();
    loop {
        code.push(ID_FIRST + (index % ID_RADIX) as u8);
        index /= ID_RADIX;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    String::from_utf8_lossy(&code).into_owned()
}

/// Mask selecting the low `width` bits.
#[inline]
pub const fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Writes the declaration section up to and including `$enddefinitions`.
pub fn write_header<W: Write>(out: &mut W, signals: &[SignalDecl], ids: &[String]) -> io::Result<()> {
    writeln!(out, "$version")?;
    writeln!(out, "    simdrive {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "$end")?;
    writeln!(out, "$timescale {TIMESCALE} $end")?;
    writeln!(out, "$scope module {TOP_SCOPE} $end")?;
    for (signal, id) in signals.iter().zip(ids) {
        let name = signal.name.replace(char::is_whitespace, "_");
        writeln!(out, "$var wire {} {id} {name} $end", signal.width)?;
    }
    writeln!(out, "$upscope $end")?;
    writeln!(out, "$enddefinitions $end")
}

/// Writes one value change.
pub fn write_value<W: Write>(out: &mut W, width: u32, value: u64, id: &str) -> io::Result<()> {
    let value = value & mask(width);
    if width == 1 {
        writeln!(out, "{value}{id}")
    } else {
        writeln!(out, "b{value:b} {id}")
    }
}
