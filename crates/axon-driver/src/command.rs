//! Command record layouts for the AX100 controller.
//!
//! A command is a fixed 72-byte value: a 32-byte common header followed by
//! one payload variant, selected by the header opcode and zero-padded to
//! the largest variant. Field order, width and little-endian byte order
//! are a hardware contract; the layout tests below pin them.
//!
//! ```text
//! header   opcode:u32  src_addr:u64  dst_addr:u64  length:u32  control:u32  status:u32
//! lsu      mirrors the header fields for a pure transfer              (32 B)
//! systolic opcode, in_h, in_w, in_c, out_h, out_w, out_c, stride,
//!          control, status                                            (40 B)
//! img2col  opcode, in_h, in_w, in_c, kernel, stride, pad,
//!          control, status                                            (36 B)
//! ```

use bytes::BufMut;

/// Encoded size of the common header.
pub const HEADER_LEN: usize = 32;

/// Encoded size reserved for the payload (largest variant, systolic).
pub const PAYLOAD_LEN: usize = 40;

/// Payload selector written into the header opcode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    /// Load-store unit transfer
    Lsu = 0x01,
    /// Systolic array operation
    Systolic = 0x02,
    /// Image-to-column transform
    Img2col = 0x03,
}

/// Systolic operation codes, written into the systolic payload's own
/// opcode field (distinct from the header opcode that tags the payload).
pub mod op {
    /// Matrix multiplication
    pub const MATMUL: u32 = 0x01;
    /// 2D convolution
    pub const CONV: u32 = 0x02;
}

/// Common command header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandHeader {
    /// Payload selector, see [`Opcode`]
    pub opcode: u32,
    /// Source device address
    pub src_addr: u64,
    /// Destination device address
    pub dst_addr: u64,
    /// Transfer length in bytes
    pub length: u32,
    /// Control flags
    pub control: u32,
    /// Operation status (written by the device)
    pub status: u32,
}

/// Load-store unit transfer parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LsuParams {
    /// Operation code
    pub opcode: u32,
    /// Source device address
    pub src_addr: u64,
    /// Destination device address
    pub dst_addr: u64,
    /// Transfer length in bytes
    pub length: u32,
    /// Control flags
    pub control: u32,
    /// Operation status (written by the device)
    pub status: u32,
}

/// Systolic array (matmul / conv) parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystolicParams {
    /// Operation code, see [`op`]
    pub opcode: u32,
    /// Input height
    pub in_height: u32,
    /// Input width
    pub in_width: u32,
    /// Input channels
    pub in_channels: u32,
    /// Output height
    pub out_height: u32,
    /// Output width
    pub out_width: u32,
    /// Output channels
    pub out_channels: u32,
    /// Stride
    pub stride: u32,
    /// Control flags (ReLU, quantization, ...)
    pub control: u32,
    /// Operation status (written by the device)
    pub status: u32,
}

/// Image-to-column transform parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Img2colParams {
    /// Operation code
    pub opcode: u32,
    /// Input image height
    pub in_height: u32,
    /// Input image width
    pub in_width: u32,
    /// Input image channels
    pub in_channels: u32,
    /// Convolution kernel size
    pub kernel_size: u32,
    /// Stride
    pub stride: u32,
    /// Padding
    pub pad: u32,
    /// Control flags
    pub control: u32,
    /// Operation status (written by the device)
    pub status: u32,
}

/// Payload variant, keyed by the header opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPayload {
    /// Load-store unit transfer
    Lsu(LsuParams),
    /// Systolic array operation
    Systolic(SystolicParams),
    /// Image-to-column transform
    Img2col(Img2colParams),
}

impl CommandPayload {
    /// The opcode that selects this payload variant.
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Lsu(_) => Opcode::Lsu,
            Self::Systolic(_) => Opcode::Systolic,
            Self::Img2col(_) => Opcode::Img2col,
        }
    }

    fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::Lsu(p) => {
                buf.put_u32_le(p.opcode);
                buf.put_u64_le(p.src_addr);
                buf.put_u64_le(p.dst_addr);
                buf.put_u32_le(p.length);
                buf.put_u32_le(p.control);
                buf.put_u32_le(p.status);
            }
            Self::Systolic(p) => {
                buf.put_u32_le(p.opcode);
                buf.put_u32_le(p.in_height);
                buf.put_u32_le(p.in_width);
                buf.put_u32_le(p.in_channels);
                buf.put_u32_le(p.out_height);
                buf.put_u32_le(p.out_width);
                buf.put_u32_le(p.out_channels);
                buf.put_u32_le(p.stride);
                buf.put_u32_le(p.control);
                buf.put_u32_le(p.status);
            }
            Self::Img2col(p) => {
                buf.put_u32_le(p.opcode);
                buf.put_u32_le(p.in_height);
                buf.put_u32_le(p.in_width);
                buf.put_u32_le(p.in_channels);
                buf.put_u32_le(p.kernel_size);
                buf.put_u32_le(p.stride);
                buf.put_u32_le(p.pad);
                buf.put_u32_le(p.control);
                buf.put_u32_le(p.status);
            }
        }
    }
}

/// The complete fixed-layout value written to the register window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRecord {
    /// Common header
    pub header: CommandHeader,
    /// Tagged payload
    pub payload: CommandPayload,
}

impl CommandRecord {
    /// Encoded size of a command record image.
    pub const ENCODED_LEN: usize = HEADER_LEN + PAYLOAD_LEN;

    /// Build a record, forcing the header opcode to the payload's tag so
    /// the two can never disagree.
    pub fn new(mut header: CommandHeader, payload: CommandPayload) -> Self {
        header.opcode = payload.opcode() as u32;
        Self { header, payload }
    }

    /// Encode the record into its fixed 72-byte image. Payload variants
    /// shorter than the reserved area leave the tail zeroed.
    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut image = [0u8; Self::ENCODED_LEN];
        let mut buf = &mut image[..];

        buf.put_u32_le(self.header.opcode);
        buf.put_u64_le(self.header.src_addr);
        buf.put_u64_le(self.header.dst_addr);
        buf.put_u32_le(self.header.length);
        buf.put_u32_le(self.header.control);
        buf.put_u32_le(self.header.status);

        self.payload.encode(&mut buf);
        image
    }
}
