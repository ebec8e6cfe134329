//! Message extensions: the generic trailer mechanism attached to several
//! message families (Init, Open, Frame, Declare, ...).
//!
//! Each extension starts with a single header byte:
//!
//! ```text
//!  7 6 5 4 3 2 1 0
//! +-+-+-+-+-+-+-+-+
//! |M|N|  enc  | id|
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! `id` (bits 0-3) identifies the extension within its message family.
//! `enc` (bits 4-5) selects how the body is encoded. `N` (bit 6) is set
//! when another extension follows this one. `M` (bit 7) is the mandatory
//! flag: a decoder that does not recognize `id` must close the session if
//! `M` is set, and may silently skip the extension otherwise.

use crate::buffer::{RBuf, WBuf};
use crate::error::CodecError;

const ID_MASK: u8 = 0x0f;
const ENC_SHIFT: u8 = 4;
const ENC_MASK: u8 = 0x03;
const FLAG_MORE: u8 = 0x40;
const FLAG_MANDATORY: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtEncoding {
    /// No body: the header byte is the entire extension.
    Unit,
    /// A single VLE-encoded u64 body.
    Zint,
    /// A VLE-length-prefixed byte body.
    ZBuf,
}

impl ExtEncoding {
    fn from_bits(bits: u8) -> Result<Self, CodecError> {
        match bits {
            0 => Ok(ExtEncoding::Unit),
            1 => Ok(ExtEncoding::Zint),
            2 => Ok(ExtEncoding::ZBuf),
            _ => Err(CodecError::Malformed("unknown extension encoding")),
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            ExtEncoding::Unit => 0,
            ExtEncoding::Zint => 1,
            ExtEncoding::ZBuf => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtBody {
    Unit,
    Zint(u64),
    ZBuf(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub id: u8,
    pub mandatory: bool,
    pub body: ExtBody,
}

impl Extension {
    pub fn unit(id: u8, mandatory: bool) -> Self {
        Extension {
            id,
            mandatory,
            body: ExtBody::Unit,
        }
    }

    pub fn zint(id: u8, mandatory: bool, value: u64) -> Self {
        Extension {
            id,
            mandatory,
            body: ExtBody::Zint(value),
        }
    }

    pub fn zbuf(id: u8, mandatory: bool, data: Vec<u8>) -> Self {
        Extension {
            id,
            mandatory,
            body: ExtBody::ZBuf(data),
        }
    }

    fn encoding(&self) -> ExtEncoding {
        match self.body {
            ExtBody::Unit => ExtEncoding::Unit,
            ExtBody::Zint(_) => ExtEncoding::Zint,
            ExtBody::ZBuf(_) => ExtEncoding::ZBuf,
        }
    }

    fn encode(&self, has_next: bool, w: &mut WBuf) {
        assert!(self.id <= ID_MASK, "extension id must fit in 4 bits");
        let mut header = self.id;
        header |= self.encoding().to_bits() << ENC_SHIFT;
        if has_next {
            header |= FLAG_MORE;
        }
        if self.mandatory {
            header |= FLAG_MANDATORY;
        }
        w.write_u8(header);
        match &self.body {
            ExtBody::Unit => {}
            ExtBody::Zint(v) => w.write_vle64(*v),
            ExtBody::ZBuf(data) => w.write_slice(data),
        }
    }
}

/// Write a full chain of extensions; the "more" flag on each is derived
/// from its position, not stored on `Extension` itself.
pub fn encode_extensions(exts: &[Extension], w: &mut WBuf) {
    for (i, ext) in exts.iter().enumerate() {
        let has_next = i + 1 < exts.len();
        ext.encode(has_next, w);
    }
}

/// Decode a chain of extensions, stopping after the one whose header byte
/// does not set the "more" flag. Unknown non-mandatory extensions are
/// retained in the result (callers decide whether to act on `id`);
/// unknown mandatory ones are rejected here since no generic decoder can
/// safely skip a body it doesn't understand... except `ZBuf`, whose
/// length-prefixed body is always skippable regardless of `id`.
pub fn decode_extensions(r: &mut RBuf) -> Result<Vec<Extension>, CodecError> {
    let mut exts = Vec::new();
    loop {
        let header = r.read_u8()?;
        let id = header & ID_MASK;
        let mandatory = header & FLAG_MANDATORY != 0;
        let has_next = header & FLAG_MORE != 0;
        let enc = ExtEncoding::from_bits((header >> ENC_SHIFT) & ENC_MASK)?;
        let body = match enc {
            ExtEncoding::Unit => ExtBody::Unit,
            ExtEncoding::Zint => ExtBody::Zint(r.read_vle64()?),
            ExtEncoding::ZBuf => ExtBody::ZBuf(r.read_slice()?.to_vec()),
        };
        if mandatory && !KNOWN_IDS.contains(&id) && !matches!(body, ExtBody::ZBuf(_)) {
            return Err(CodecError::ExtensionUnknownMandatory(id));
        }
        exts.push(Extension {
            id,
            mandatory,
            body,
        });
        if !has_next {
            break;
        }
    }
    Ok(exts)
}

/// Extension ids this crate assigns meaning to. Anything else is opaque
/// and only decoded generically (and only acted on by callers that know
/// its id out of band).
const KNOWN_IDS: [u8; 0] = [];
