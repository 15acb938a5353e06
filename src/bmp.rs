//! BMP files
//!
//! Only the subset needed to exchange palettized images is handled:
//! a 14 byte file header, a 40 byte info header, 2^bpp palette entries,
//! then uncompressed scanlines stored bottom-up and padded to 4 bytes.
//! Headers are read and written field by field in little endian order.
//!
//! Palettes only matter when saving.  The built-in tables are kept in a
//! `Palettes` value that the caller owns for the duration of an export;
//! its 256 color table can be replaced by the one in another BMP file.

use num_traits::FromPrimitive;
use std::io::Write;
use std::path::Path;
use crate::bitmap::{Bpp,Layout,PixelBuffer};
use crate::tools::backup::create_with_backup;
use crate::{Error,DYNERR,STDRESULT};

const BMP_SIG: u16 = 0x4d42;
const BI_RGB: u32 = 0;
const FILE_HEADER_SIZE: usize = 14;
const INFO_HEADER_SIZE: usize = 40;

fn read_u16(buf: &[u8],offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset+2)?;
    Some(u16::from_le_bytes([bytes[0],bytes[1]]))
}

fn read_u32(buf: &[u8],offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset+4)?;
    Some(u32::from_le_bytes([bytes[0],bytes[1],bytes[2],bytes[3]]))
}

fn read_i32(buf: &[u8],offset: usize) -> Option<i32> {
    read_u32(buf,offset).map(|v| v as i32)
}

/// BITMAPFILEHEADER
#[derive(Debug,PartialEq)]
struct FileHeader {
    file_type: u16,
    size: u32,
    reserved1: u16,
    reserved2: u16,
    off_bits: u32
}

impl FileHeader {
    fn from_bytes(buf: &[u8]) -> Option<Self> {
        Some(Self {
            file_type: read_u16(buf,0)?,
            size: read_u32(buf,2)?,
            reserved1: read_u16(buf,6)?,
            reserved2: read_u16(buf,8)?,
            off_bits: read_u32(buf,10)?
        })
    }
    fn to_bytes(&self) -> Vec<u8> {
        [
            u16::to_le_bytes(self.file_type).to_vec(),
            u32::to_le_bytes(self.size).to_vec(),
            u16::to_le_bytes(self.reserved1).to_vec(),
            u16::to_le_bytes(self.reserved2).to_vec(),
            u32::to_le_bytes(self.off_bits).to_vec()
        ].concat()
    }
}

/// BITMAPINFOHEADER
#[derive(Debug,PartialEq)]
struct InfoHeader {
    size: u32,
    width: i32,
    height: i32,
    planes: u16,
    bit_count: u16,
    compression: u32,
    size_image: u32,
    x_pels_per_meter: i32,
    y_pels_per_meter: i32,
    clr_used: u32,
    clr_important: u32
}

impl InfoHeader {
    fn from_bytes(buf: &[u8]) -> Option<Self> {
        Some(Self {
            size: read_u32(buf,0)?,
            width: read_i32(buf,4)?,
            height: read_i32(buf,8)?,
            planes: read_u16(buf,12)?,
            bit_count: read_u16(buf,14)?,
            compression: read_u32(buf,16)?,
            size_image: read_u32(buf,20)?,
            x_pels_per_meter: read_i32(buf,24)?,
            y_pels_per_meter: read_i32(buf,28)?,
            clr_used: read_u32(buf,32)?,
            clr_important: read_u32(buf,36)?
        })
    }
    fn to_bytes(&self) -> Vec<u8> {
        [
            u32::to_le_bytes(self.size).to_vec(),
            i32::to_le_bytes(self.width).to_vec(),
            i32::to_le_bytes(self.height).to_vec(),
            u16::to_le_bytes(self.planes).to_vec(),
            u16::to_le_bytes(self.bit_count).to_vec(),
            u32::to_le_bytes(self.compression).to_vec(),
            u32::to_le_bytes(self.size_image).to_vec(),
            i32::to_le_bytes(self.x_pels_per_meter).to_vec(),
            i32::to_le_bytes(self.y_pels_per_meter).to_vec(),
            u32::to_le_bytes(self.clr_used).to_vec(),
            u32::to_le_bytes(self.clr_important).to_vec()
        ].concat()
    }
}

/// Parse both headers, checking the signature
fn read_headers(buf: &[u8]) -> Result<(FileHeader,InfoHeader),Error> {
    let fh = match FileHeader::from_bytes(buf) {
        Some(fh) if fh.file_type == BMP_SIG => fh,
        _ => {
            log::debug!("BMP signature not found");
            return Err(Error::FileFormatMismatch);
        }
    };
    match buf.get(FILE_HEADER_SIZE..).and_then(InfoHeader::from_bytes) {
        Some(ih) => Ok((fh,ih)),
        None => {
            log::debug!("BMP info header is truncated");
            Err(Error::FileFormatMismatch)
        }
    }
}

/// Table of BGRX color entries
#[derive(Clone,Debug,PartialEq)]
pub struct Palette {
    entries: Vec<[u8;4]>
}

impl Palette {
    /// black and bright white
    pub fn mono() -> Self {
        Self {
            entries: vec![[0x00,0x00,0x00,0x00],[0xff,0xff,0xff,0x00]]
        }
    }
    /// four shades of gray
    pub fn gray4() -> Self {
        Self {
            entries: vec![
                [0x00,0x00,0x00,0x00],
                [0x55,0x55,0x55,0x00],
                [0xaa,0xaa,0xaa,0x00],
                [0xff,0xff,0xff,0x00]
            ]
        }
    }
    /// The 16 EGA colors, then orange for transparency and 15 pale variants
    /// for masked areas.  The remaining entries are unused and get a color
    /// that is easy to spot.
    pub fn ega256() -> Self {
        let mut entries: Vec<[u8;4]> = vec![
            [0x00,0x00,0x00,0x00], // black
            [0xaa,0x00,0x00,0x00], // blue
            [0x00,0xaa,0x00,0x00], // green
            [0xaa,0xaa,0x00,0x00], // cyan
            [0x00,0x00,0xaa,0x00], // red
            [0xaa,0x00,0xaa,0x00], // magenta
            [0x00,0x55,0xaa,0x00], // brown
            [0xaa,0xaa,0xaa,0x00], // white
            [0x55,0x55,0x55,0x00], // dark gray
            [0xff,0x55,0x55,0x00], // bright blue
            [0x55,0xff,0x55,0x00], // bright green
            [0xff,0xff,0x55,0x00], // bright cyan
            [0x55,0x55,0xff,0x00], // bright red
            [0xff,0x55,0xff,0x00], // bright magenta
            [0x55,0xff,0xff,0x00], // bright yellow
            [0xff,0xff,0xff,0x00], // bright white
            [0x00,0xcc,0xff,0x00], // orange
            [0xe3,0xaa,0xaa,0x00],
            [0xaa,0xe3,0xaa,0x00],
            [0xe3,0xe3,0xaa,0x00],
            [0xaa,0xaa,0xe3,0x00],
            [0xe3,0xaa,0xe3,0x00],
            [0xaa,0xc7,0xe3,0x00],
            [0xe3,0xe3,0xe3,0x00],
            [0xc7,0xc7,0xc7,0x00],
            [0xff,0xc7,0xc7,0x00],
            [0xc7,0xff,0xc7,0x00],
            [0xff,0xff,0xc7,0x00],
            [0xc7,0xc7,0xff,0x00],
            [0xff,0xc7,0xff,0x00],
            [0xc7,0xff,0xff,0x00],
            [0xff,0xff,0xff,0x00]
        ];
        entries.resize(256,[0x00,0x99,0x99,0x00]);
        Self {
            entries
        }
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// BGRX entry, if present
    pub fn get(&self,idx: usize) -> Option<[u8;4]> {
        self.entries.get(idx).copied()
    }
}

/// The palettes in effect for an export session
#[derive(Clone,Debug,PartialEq)]
pub struct Palettes {
    pal2: Palette,
    pal4: Palette,
    pal256: Palette
}

impl Default for Palettes {
    fn default() -> Self {
        Self {
            pal2: Palette::mono(),
            pal4: Palette::gray4(),
            pal256: Palette::ega256()
        }
    }
}

impl Palettes {
    /// Built-in table for the color count of `bpp`, 16 colors use the head of the 256 color table
    pub fn for_bpp(&self,bpp: Bpp) -> &Palette {
        match bpp.colors() {
            2 => &self.pal2,
            4 => &self.pal4,
            _ => &self.pal256
        }
    }
    /// Replace entries of the 256 color table with the color table of an 8 bpp BMP image.
    /// `biClrUsed` entries are taken, or all 256 if it is zero.
    pub fn set_palette256(&mut self,bmp: &[u8]) -> Result<(),Error> {
        let (_fh,ih) = read_headers(bmp)?;
        if ih.planes != 1 || ih.bit_count != 8 || ih.compression != BI_RGB || ih.height < 0 {
            log::error!("palette source must be an uncompressed 8 bpp BMP");
            return Err(Error::FileFormatMismatch);
        }
        let count = match ih.clr_used {
            0 => 256,
            n => usize::min(n as usize,256)
        };
        let beg = FILE_HEADER_SIZE + ih.size as usize;
        let table = match bmp.get(beg..beg + 4*count) {
            Some(t) => t,
            None => {
                log::error!("palette source color table is truncated");
                return Err(Error::FileFormatMismatch);
            }
        };
        for (i,quad) in table.chunks_exact(4).enumerate() {
            self.pal256.entries[i] = [quad[0],quad[1],quad[2],quad[3]];
        }
        log::debug!("replaced {} palette entries",count);
        Ok(())
    }
    /// Replace the 256 color table with the one in the BMP file at `path`
    pub fn load_palette<P: AsRef<Path>>(&mut self,path: P) -> STDRESULT {
        let dat = std::fs::read(path)?;
        self.set_palette256(&dat)?;
        Ok(())
    }
}

/// Decode a BMP image held in memory.
/// Anything other than an uncompressed, bottom-up, 1/2/4/8 bpp image is rejected.
pub fn decode(buf: &[u8]) -> Result<PixelBuffer,Error> {
    let (fh,ih) = read_headers(buf)?;
    if ih.planes != 1 || ih.compression != BI_RGB || ih.height < 0 || ih.width < 0 {
        log::debug!("unsupported BMP: planes {}, compression {}, {}x{}",ih.planes,ih.compression,ih.width,ih.height);
        return Err(Error::FileFormatMismatch);
    }
    let bpp = match Bpp::from_u16(ih.bit_count) {
        Some(bpp) => bpp,
        None => {
            log::debug!("unsupported BMP: {} bits per pixel",ih.bit_count);
            return Err(Error::FileFormatMismatch);
        }
    };
    let width = ih.width as usize;
    let height = ih.height as usize;
    let stride = PixelBuffer::padded_stride(width,bpp);
    let beg = fh.off_bits as usize;
    let data = match buf.get(beg..beg + stride*height) {
        Some(d) => d,
        None => {
            log::debug!("BMP pixel data is truncated");
            return Err(Error::FileFormatMismatch);
        }
    };
    let mut bits = Vec::with_capacity(stride*height);
    for line in data.chunks_exact(stride.max(1)).take(height).rev() {
        bits.extend_from_slice(line);
    }
    PixelBuffer::from_scanlines(width,height,bpp,bits)
}

/// Encode a padded buffer as a BMP image using the session palettes
pub fn encode(img: &PixelBuffer,palettes: &Palettes) -> Result<Vec<u8>,Error> {
    if img.layout() != Layout::Padded {
        log::error!("planar buffers cannot be saved as BMP");
        return Err(Error::WrongLayout);
    }
    let colors = img.bpp().colors();
    let palette = palettes.for_bpp(img.bpp());
    let image_size = img.stride() * img.height();
    let off_bits = FILE_HEADER_SIZE + INFO_HEADER_SIZE + 4*colors;
    let fh = FileHeader {
        file_type: BMP_SIG,
        size: (off_bits + image_size) as u32,
        reserved1: 0,
        reserved2: 0,
        off_bits: off_bits as u32
    };
    let ih = InfoHeader {
        size: INFO_HEADER_SIZE as u32,
        width: img.width() as i32,
        height: img.height() as i32,
        planes: 1,
        bit_count: img.bpp().bits() as u16,
        compression: BI_RGB,
        size_image: image_size as u32,
        x_pels_per_meter: 0,
        y_pels_per_meter: 0,
        clr_used: colors as u32,
        clr_important: 0
    };
    let mut ans = Vec::with_capacity(off_bits + image_size);
    ans.append(&mut fh.to_bytes());
    ans.append(&mut ih.to_bytes());
    for i in 0..colors {
        ans.extend_from_slice(&palette.get(i).unwrap_or([0;4]));
    }
    for y in (0..img.height()).rev() {
        if let Some(row) = img.row(y) {
            ans.extend_from_slice(row);
        }
    }
    Ok(ans)
}

/// Load a BMP file
pub fn load<P: AsRef<Path>>(path: P) -> Result<PixelBuffer,DYNERR> {
    let dat = std::fs::read(&path)?;
    let img = decode(&dat)?;
    log::debug!("loaded {}: {}x{} at {} bpp",path.as_ref().display(),img.width(),img.height(),img.bpp().bits());
    Ok(img)
}

/// Save a BMP file.  If `backup` is set an existing file is first renamed to `<path>.bakN`.
pub fn save<P: AsRef<Path>>(path: P,img: &PixelBuffer,backup: bool,palettes: &Palettes) -> STDRESULT {
    let dat = encode(img,palettes)?;
    let mut file = create_with_backup(path.as_ref(),backup)?;
    file.write_all(&dat)?;
    log::debug!("saved {}: {} bytes",path.as_ref().display(),dat.len());
    Ok(())
}

#[cfg(test)]
fn checker(w: usize,h: usize,bpp: usize) -> PixelBuffer {
    let mut img = PixelBuffer::create(w,h,bpp).expect("create failed");
    for y in 0..h {
        for x in 0..w {
            img.put_pixel(x as i32,y as i32,(x*3 + y*5) as u8);
        }
    }
    img
}

#[test]
fn header_layout() {
    let img = checker(3,2,4);
    let dat = encode(&img,&Palettes::default()).expect("encode failed");
    assert_eq!(&dat[0..2],b"BM");
    // 14 + 40 + 16*4 palette + 2 rows of 4 bytes
    assert_eq!(dat.len(),14 + 40 + 64 + 8);
    assert_eq!(read_u32(&dat,2),Some(126));
    assert_eq!(read_u32(&dat,10),Some(118));
    assert_eq!(read_u32(&dat,14),Some(40));
    assert_eq!(read_i32(&dat,18),Some(3));
    assert_eq!(read_i32(&dat,22),Some(2));
    assert_eq!(read_u16(&dat,26),Some(1));
    assert_eq!(read_u16(&dat,28),Some(4));
    assert_eq!(read_u32(&dat,34),Some(8));
    assert_eq!(read_u32(&dat,46),Some(16));
    // palette entry 1 is EGA blue
    assert_eq!(dat[58..62].to_vec(),vec![0xaa,0x00,0x00,0x00]);
    // first stored row is the bottom row: pixels 5,8,11 at 4 bpp
    assert_eq!(dat[118..122].to_vec(),vec![0x58,0xb0,0x00,0x00]);
}

#[test]
fn header_round_trip() {
    let fh = FileHeader { file_type: BMP_SIG, size: 1234, reserved1: 0, reserved2: 7, off_bits: 62 };
    assert_eq!(FileHeader::from_bytes(&fh.to_bytes()),Some(fh));
    let ih = InfoHeader {
        size: 40, width: 17, height: 9, planes: 1, bit_count: 2, compression: 0, size_image: 72,
        x_pels_per_meter: -1, y_pels_per_meter: 2835, clr_used: 4, clr_important: 0
    };
    let bytes = ih.to_bytes();
    assert_eq!(bytes.len(),INFO_HEADER_SIZE);
    assert_eq!(InfoHeader::from_bytes(&bytes),Some(ih));
}

#[test]
fn encode_decode() {
    for bpp in [1,2,4,8] {
        let img = checker(13,7,bpp);
        let dat = encode(&img,&Palettes::default()).expect("encode failed");
        assert_eq!(decode(&dat).expect("decode failed"),img);
    }
}

#[test]
fn rejects_bad_files() {
    let good = encode(&checker(8,8,4),&Palettes::default()).unwrap();
    let mut bad = good.clone();
    bad[0] = b'X';
    assert_eq!(decode(&bad),Err(Error::FileFormatMismatch));
    let mut bad = good.clone();
    bad[26] = 2; // planes
    assert_eq!(decode(&bad),Err(Error::FileFormatMismatch));
    let mut bad = good.clone();
    bad[28] = 24; // bpp
    assert_eq!(decode(&bad),Err(Error::FileFormatMismatch));
    bad[28] = 3;
    assert_eq!(decode(&bad),Err(Error::FileFormatMismatch));
    let mut bad = good.clone();
    bad[30] = 1; // RLE8
    assert_eq!(decode(&bad),Err(Error::FileFormatMismatch));
    let mut bad = good.clone();
    bad[22..26].copy_from_slice(&i32::to_le_bytes(-8)); // top-down
    assert_eq!(decode(&bad),Err(Error::FileFormatMismatch));
    assert_eq!(decode(&good[0..good.len()-1]),Err(Error::FileFormatMismatch));
    assert_eq!(decode(&good[0..20]),Err(Error::FileFormatMismatch));
}

#[test]
fn palette_selection() {
    let pals = Palettes::default();
    assert_eq!(pals.for_bpp(Bpp::One).len(),2);
    assert_eq!(pals.for_bpp(Bpp::Two).len(),4);
    assert_eq!(pals.for_bpp(Bpp::Four).get(16),Some([0x00,0xcc,0xff,0x00]));
    assert_eq!(pals.for_bpp(Bpp::Eight).get(255),Some([0x00,0x99,0x99,0x00]));
    let mono = encode(&checker(8,1,1),&pals).unwrap();
    assert_eq!(mono[54..62].to_vec(),vec![0,0,0,0,0xff,0xff,0xff,0]);
}

#[test]
fn replace_palette() {
    let mut src = encode(&checker(4,4,8),&Palettes::default()).unwrap();
    src[54+4*3..54+4*4].copy_from_slice(&[1,2,3,0]);
    let mut pals = Palettes::default();
    pals.set_palette256(&src).expect("palette rejected");
    assert_eq!(pals.for_bpp(Bpp::Eight).get(3),Some([1,2,3,0]));
    assert_eq!(pals.for_bpp(Bpp::One),&Palette::mono());
    let ega = encode(&checker(4,4,4),&pals).unwrap();
    assert_eq!(pals.set_palette256(&ega),Err(Error::FileFormatMismatch));
}

#[test]
fn save_and_load() {
    let dir = tempfile::tempdir().expect("no temp dir");
    let path = dir.path().join("tile.bmp");
    let img = checker(16,16,4);
    save(&path,&img,false,&Palettes::default()).expect("save failed");
    save(&path,&img,true,&Palettes::default()).expect("save failed");
    assert!(dir.path().join("tile.bmp.bak0").is_file());
    assert_eq!(load(&path).expect("load failed"),img);
    let mut planar = img.clone();
    planar.unpack().unwrap();
    assert!(save(&path,&planar,false,&Palettes::default()).is_err());
}
