//! Pixel buffers and the planar transforms
//!
//! A `PixelBuffer` stores samples of 1, 2, 4, or 8 bits, packed MSB first, i.e.,
//! pixel 0 of a scanline always lives in the high bits of the first byte.
//! Rows are padded to a multiple of 4 bytes so they can be written straight into a
//! BMP file.  The transforms in this module rearrange samples between that
//! packed form and the layouts used by the period graphics hardware:
//!
//! * `split` / `merge` separate or recombine bit layers ("bit planes")
//! * `munge` / `demunge` separate or recombine every n-th column
//! * `unpack` re-emits a 4 bpp image as four unpadded monochrome planes
//!
//! Errors are only returned for structural problems (bad bpp, mismatched planes, etc.).
//! Pixel access outside the buffer is not an error, it just returns `None`.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use crate::Error;

/// Bits per pixel, the discriminant is the bit count
#[derive(FromPrimitive,Clone,Copy,Debug,PartialEq,Eq)]
pub enum Bpp {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8
}

impl Bpp {
    /// Returns `Error::UnsupportedBpp` unless `bits` is 1, 2, 4, or 8
    pub fn from_bits(bits: usize) -> Result<Self,Error> {
        match Bpp::from_usize(bits) {
            Some(bpp) => Ok(bpp),
            None => {
                log::error!("{} bits per pixel is not supported",bits);
                Err(Error::UnsupportedBpp)
            }
        }
    }
    pub fn bits(&self) -> usize {
        *self as usize
    }
    /// mask covering one sample
    pub fn mask(&self) -> u8 {
        ((1u16 << self.bits()) - 1) as u8
    }
    /// number of distinct sample values
    pub fn colors(&self) -> usize {
        1 << self.bits()
    }
}

/// How the bytes of a buffer are arranged
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Layout {
    /// one scanline per row, native bpp, rows padded to 4 bytes
    Padded,
    /// four 1 bpp planes (blue, green, red, intensity) stored one after the other,
    /// rows are `ceil(width/8)` bytes with no padding
    Planar
}

/// Remap a sample being copied between buffers of different bpp.
/// Pairs that are not listed pass the sample through as is.
fn remap_sample(c: u8,from: Bpp,to: Bpp) -> u8 {
    match (from,to) {
        (Bpp::One,Bpp::Two) => if c==1 { 3 } else { 0 },
        (Bpp::One,Bpp::Four) => if c==1 { 15 } else { 0 },
        (Bpp::One,Bpp::Eight) => if c==1 { 15 } else { 0 },
        (Bpp::Four,Bpp::One) => if c > 7 { 1 } else { 0 },
        (Bpp::Four,Bpp::Eight) => c,
        (Bpp::Eight,Bpp::One) => if c > 7 { 1 } else { 0 },
        (Bpp::Eight,Bpp::Four) => c % 16,
        _ => c
    }
}

/// An image with 1, 2, 4, or 8 bits per pixel.
/// Every factory method hands back a buffer owned by the caller, there is no sharing.
#[derive(Clone,Debug,PartialEq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    bpp: Bpp,
    /// bytes per row (per plane row in the planar layout)
    stride: usize,
    layout: Layout,
    bits: Vec<u8>
}

impl PixelBuffer {
    /// Create a zero filled buffer, `bpp` must be 1, 2, 4, or 8
    pub fn create(width: usize,height: usize,bpp: usize) -> Result<Self,Error> {
        Ok(Self::with_bpp(width,height,Bpp::from_bits(bpp)?))
    }
    /// Create a zero filled buffer with an already validated bpp
    pub fn with_bpp(width: usize,height: usize,bpp: Bpp) -> Self {
        let stride = Self::padded_stride(width,bpp);
        Self {
            width,
            height,
            bpp,
            stride,
            layout: Layout::Padded,
            bits: vec![0;stride*height]
        }
    }
    /// Wrap existing padded scanlines, row 0 first.
    /// Fails if `bits` does not hold exactly `height` rows.
    pub fn from_scanlines(width: usize,height: usize,bpp: Bpp,bits: Vec<u8>) -> Result<Self,Error> {
        let stride = Self::padded_stride(width,bpp);
        if bits.len() != stride*height {
            log::error!("expected {} bytes of scanlines, got {}",stride*height,bits.len());
            return Err(Error::FileFormatMismatch);
        }
        Ok(Self {
            width,
            height,
            bpp,
            stride,
            layout: Layout::Padded,
            bits
        })
    }
    /// bytes per row including the padding to a 4 byte boundary
    pub fn padded_stride(width: usize,bpp: Bpp) -> usize {
        ((width * bpp.bits() + 31) >> 3) & !3
    }
    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    pub fn bpp(&self) -> Bpp {
        self.bpp
    }
    pub fn stride(&self) -> usize {
        self.stride
    }
    pub fn layout(&self) -> Layout {
        self.layout
    }
    /// raw bytes in the current layout
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
    /// one padded scanline
    pub fn row(&self,y: usize) -> Option<&[u8]> {
        match (self.layout,y < self.height) {
            (Layout::Padded,true) => Some(&self.bits[y*self.stride..(y+1)*self.stride]),
            _ => None
        }
    }
    /// one row of one plane after `unpack`
    pub fn plane_row(&self,plane: usize,y: usize) -> Option<&[u8]> {
        match (self.layout,plane < 4 && y < self.height) {
            (Layout::Planar,true) => {
                let beg = (plane*self.height + y) * self.stride;
                Some(&self.bits[beg..beg+self.stride])
            },
            _ => None
        }
    }
    fn in_bounds(&self,x: i32,y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }
    /// Byte offset and shift for a pixel in a planar row.
    /// The last byte of a row is right-aligned when the width is not a multiple of 8.
    fn planar_addr(&self,plane: usize,x: usize,y: usize) -> (usize,usize) {
        let offset = (plane*self.height + y) * self.stride + x/8;
        let tail = self.width % 8;
        let shift = match tail > 0 && x/8 == self.width/8 {
            true => tail - 1 - x%8,
            false => 7 - x%8
        };
        (offset,shift)
    }
    /// Get the sample at (x,y), or `None` if out of bounds
    pub fn get_pixel(&self,x: i32,y: i32) -> Option<u8> {
        if !self.in_bounds(x,y) {
            return None;
        }
        let (x,y) = (x as usize,y as usize);
        if self.layout == Layout::Planar {
            let mut c = 0;
            for p in 0..4 {
                let (offset,shift) = self.planar_addr(p,x,y);
                c |= ((self.bits[offset] >> shift) & 1) << p;
            }
            return Some(c);
        }
        let bpp = self.bpp.bits();
        let per_byte = 8 / bpp;
        let byte = self.bits[y*self.stride + x/per_byte];
        let shift = (per_byte - 1 - x%per_byte) * bpp;
        Some((byte >> shift) & self.bpp.mask())
    }
    /// Put `c` masked to the bpp at (x,y).
    /// Returns the stored value, or `None` (leaving the buffer alone) if out of bounds.
    pub fn put_pixel(&mut self,x: i32,y: i32,c: u8) -> Option<u8> {
        if !self.in_bounds(x,y) {
            return None;
        }
        let (x,y) = (x as usize,y as usize);
        let c = c & self.bpp.mask();
        if self.layout == Layout::Planar {
            for p in 0..4 {
                let (offset,shift) = self.planar_addr(p,x,y);
                self.bits[offset] &= !(1u8 << shift);
                self.bits[offset] |= ((c >> p) & 1) << shift;
            }
            return Some(c);
        }
        let bpp = self.bpp.bits();
        let per_byte = 8 / bpp;
        let shift = (per_byte - 1 - x%per_byte) * bpp;
        let byte = &mut self.bits[y*self.stride + x/per_byte];
        *byte &= !(self.bpp.mask() << shift);
        *byte |= c << shift;
        Some(c)
    }
    /// Fill the inclusive rectangle (x1,y1)-(x2,y2) clipped to the buffer.
    /// Nothing happens if x1 > x2 or y1 > y2.
    pub fn rect(&mut self,x1: i32,y1: i32,x2: i32,y2: i32,c: u8) {
        if x1 > x2 || y1 > y2 {
            return;
        }
        let x1 = x1.max(0);
        let y1 = y1.max(0);
        let x2 = x2.min(self.width as i32 - 1);
        let y2 = y2.min(self.height as i32 - 1);
        for y in y1..=y2 {
            for x in x1..=x2 {
                self.put_pixel(x,y,c);
            }
        }
    }
    /// Deep copy
    pub fn duplicate(&self) -> Self {
        self.clone()
    }
    /// iterate over all in-bounds coordinates in row order
    fn coords(&self) -> impl Iterator<Item=(i32,i32)> {
        let w = self.width as i32;
        (0..self.height as i32).flat_map(move |y| (0..w).map(move |x| (x,y)))
    }
    /// Split bit layers into `plane_count` new buffers of `plane_bpp` each.
    /// Plane `p` gets bits `plane_start + p*plane_bpp ..` of each sample.
    pub fn split(&self,plane_start: usize,plane_count: usize,plane_bpp: usize) -> Result<Vec<PixelBuffer>,Error> {
        let pbpp = Bpp::from_bits(plane_bpp)?;
        if plane_count*plane_bpp + plane_start > self.bpp.bits() {
            log::error!("cannot take {} planes of {} bits starting at bit {} from {} bpp",
                plane_count,plane_bpp,plane_start,self.bpp.bits());
            return Err(Error::PlaneRange);
        }
        let mut planes = Vec::with_capacity(plane_count);
        for p in 0..plane_count {
            let mut plane = PixelBuffer::with_bpp(self.width,self.height,pbpp);
            let shift = p*plane_bpp + plane_start;
            for (x,y) in self.coords() {
                if let Some(c) = self.get_pixel(x,y) {
                    plane.put_pixel(x,y,c >> shift);
                }
            }
            planes.push(plane);
        }
        Ok(planes)
    }
    /// Merge planes of equal size and bpp into one buffer of `bpp` bits.
    /// Plane `p` contributes its sample shifted up by `p` times the plane bpp.
    pub fn merge(planes: &[PixelBuffer],bpp: usize) -> Result<PixelBuffer,Error> {
        let out_bpp = Bpp::from_bits(bpp)?;
        let first = Self::check_planes(planes)?;
        if planes.len() > 8 || bpp < planes.len() {
            log::error!("cannot merge {} planes into {} bpp",planes.len(),bpp);
            return Err(Error::PlaneRange);
        }
        let plane_bpp = first.bpp.bits();
        let mut ans = PixelBuffer::with_bpp(first.width,first.height,out_bpp);
        for (x,y) in first.coords() {
            let mut c: u64 = 0;
            for (p,plane) in planes.iter().enumerate() {
                let sample = plane.get_pixel(x,y).unwrap_or(0) as u64;
                c |= sample << (p*plane_bpp);
            }
            ans.put_pixel(x,y,(c & 0xff) as u8);
        }
        Ok(ans)
    }
    /// Make sure there is at least one plane and all planes agree in size and bpp
    fn check_planes(planes: &[PixelBuffer]) -> Result<&PixelBuffer,Error> {
        let first = match planes.first() {
            Some(p) => p,
            None => {
                log::error!("no planes were given");
                return Err(Error::NoPlanes);
            }
        };
        for plane in planes {
            if plane.width != first.width || plane.height != first.height || plane.bpp != first.bpp {
                log::error!("plane {}x{}x{} does not match {}x{}x{}",
                    plane.width,plane.height,plane.bpp.bits(),first.width,first.height,first.bpp.bits());
                return Err(Error::PlaneMismatch);
            }
        }
        Ok(first)
    }
    /// Split the columns among `plane_count` new buffers, plane `p` takes columns
    /// `p`, `p+plane_count`, ...  The width must be divisible by `plane_count`.
    pub fn munge(&self,plane_count: usize) -> Result<Vec<PixelBuffer>,Error> {
        if plane_count == 0 {
            return Err(Error::NoPlanes);
        }
        if self.width % plane_count != 0 {
            log::error!("width {} cannot be split into {} planes",self.width,plane_count);
            return Err(Error::WidthNotDivisible);
        }
        let mut planes = Vec::with_capacity(plane_count);
        for p in 0..plane_count {
            let mut plane = PixelBuffer::with_bpp(self.width/plane_count,self.height,self.bpp);
            for (x,y) in plane.coords() {
                let src_x = x*plane_count as i32 + p as i32;
                if let Some(c) = self.get_pixel(src_x,y) {
                    plane.put_pixel(x,y,c);
                }
            }
            planes.push(plane);
        }
        Ok(planes)
    }
    /// Interleave the columns of equally sized planes, inverse of `munge`
    pub fn demunge(planes: &[PixelBuffer],bpp: usize) -> Result<PixelBuffer,Error> {
        let bpp = Bpp::from_bits(bpp)?;
        let first = Self::check_planes(planes)?;
        if first.bpp != bpp {
            log::error!("planes are {} bpp, expected {}",first.bpp.bits(),bpp.bits());
            return Err(Error::PlaneMismatch);
        }
        let count = planes.len();
        let mut ans = PixelBuffer::with_bpp(first.width*count,first.height,bpp);
        for (p,plane) in planes.iter().enumerate() {
            for (x,y) in plane.coords() {
                if let Some(c) = plane.get_pixel(x,y) {
                    ans.put_pixel(x*count as i32 + p as i32,y,c);
                }
            }
        }
        Ok(ans)
    }
    /// Copy a `w` by `h` rectangle from `src` at (sx,sy) into `self` at (dx,dy), clipping to both buffers.
    /// Samples are converted when the bpp differ, see `remap_sample`.
    pub fn blit(&mut self,src: &PixelBuffer,sx: usize,sy: usize,dx: usize,dy: usize,w: usize,h: usize) {
        let (mut sx,mut sy,mut dx,mut dy,mut w,mut h) = (sx,sy,dx,dy,w,h);
        // an origin beyond the edge is pulled back to the last column or row
        if sx > src.width { sx = src.width.saturating_sub(1); }
        if sx.saturating_add(w) > src.width { w = src.width - sx; }
        if sy > src.height { sy = src.height.saturating_sub(1); }
        if sy.saturating_add(h) > src.height { h = src.height - sy; }
        if dx > self.width { dx = self.width.saturating_sub(1); }
        if dx + w > self.width { w = self.width.saturating_sub(dx); }
        if dy > self.height { dy = self.height.saturating_sub(1); }
        if dy + h > self.height { h = self.height.saturating_sub(dy); }
        for y in 0..h {
            for x in 0..w {
                if let Some(c) = src.get_pixel((sx+x) as i32,(sy+y) as i32) {
                    let c = remap_sample(c,src.bpp,self.bpp);
                    self.put_pixel((dx+x) as i32,(dy+y) as i32,c);
                }
            }
        }
    }
    /// Convert a 4 bpp buffer to the planar layout: blue, green, red, intensity,
    /// each plane `ceil(width/8)` bytes per row, no padding.
    /// This is only used to feed legacy exporters, the pixel accessors keep working.
    pub fn unpack(&mut self) -> Result<(),Error> {
        if self.bpp != Bpp::Four {
            log::error!("only 4 bpp can be unpacked to planes");
            return Err(Error::UnsupportedBpp);
        }
        if self.layout == Layout::Planar {
            return Ok(());
        }
        let unpack_w = (self.width + 7) / 8;
        let mut bits = Vec::with_capacity(unpack_w*self.height*4);
        for p in 0..4 {
            for y in 0..self.height {
                let mut count = 0;
                let mut byte: u8 = 0;
                for x in 0..self.width {
                    let c = self.get_pixel(x as i32,y as i32).unwrap_or(0);
                    byte = (byte << 1) | ((c >> p) & 1);
                    count += 1;
                    if count == 8 {
                        bits.push(byte);
                        count = 0;
                        byte = 0;
                    }
                }
                if count != 0 {
                    bits.push(byte);
                }
            }
        }
        log::trace!("unpacked {}x{} into planes of {} bytes per row",self.width,self.height,unpack_w);
        self.bits = bits;
        self.stride = unpack_w;
        self.layout = Layout::Planar;
        Ok(())
    }
    /// Blue, green, red, and intensity planes of a 4 bpp buffer
    pub fn split_ega(&self) -> Result<[PixelBuffer;4],Error> {
        if self.bpp != Bpp::Four {
            return Err(Error::UnsupportedBpp);
        }
        let mut planes = self.split(0,4,1)?.into_iter();
        match (planes.next(),planes.next(),planes.next(),planes.next()) {
            (Some(b),Some(g),Some(r),Some(i)) => Ok([b,g,r,i]),
            _ => Err(Error::PlaneRange)
        }
    }
    /// Combine blue, green, red, and intensity planes into an 8 bpp buffer using
    /// the first 16 colors
    pub fn merge_ega(planes: &[PixelBuffer;4]) -> Result<PixelBuffer,Error> {
        if planes.iter().any(|p| p.bpp != Bpp::One) {
            return Err(Error::PlaneMismatch);
        }
        Self::merge(planes,8)
    }
}

#[cfg(test)]
fn gradient(w: usize,h: usize,bpp: usize,f: impl Fn(usize,usize) -> u8) -> PixelBuffer {
    let mut buf = PixelBuffer::create(w,h,bpp).expect("create failed");
    for y in 0..h {
        for x in 0..w {
            buf.put_pixel(x as i32,y as i32,f(x,y));
        }
    }
    buf
}

#[test]
fn stride_is_padded() {
    assert_eq!(PixelBuffer::padded_stride(1,Bpp::One),4);
    assert_eq!(PixelBuffer::padded_stride(33,Bpp::One),8);
    assert_eq!(PixelBuffer::padded_stride(9,Bpp::Four),8);
    assert_eq!(PixelBuffer::padded_stride(5,Bpp::Eight),8);
    assert_eq!(PixelBuffer::create(3,2,3),Err(Error::UnsupportedBpp));
}

#[test]
fn msb_first_packing() {
    let mut buf = PixelBuffer::create(8,1,1).unwrap();
    buf.put_pixel(0,0,1);
    assert_eq!(buf.row(0).unwrap()[0],0x80);
    let mut buf = PixelBuffer::create(4,1,2).unwrap();
    buf.put_pixel(1,0,3);
    assert_eq!(buf.row(0).unwrap()[0],0x30);
    let mut buf = PixelBuffer::create(2,1,4).unwrap();
    buf.put_pixel(0,0,0xa);
    buf.put_pixel(1,0,0x5);
    assert_eq!(buf.row(0).unwrap()[0],0xa5);
}

#[test]
fn pixel_access() {
    for bpp in [1,2,4,8] {
        let mut buf = PixelBuffer::create(13,3,bpp).unwrap();
        buf.put_pixel(12,2,0xff);
        assert_eq!(buf.get_pixel(12,2),Some(((1u16 << bpp) - 1) as u8));
        assert_eq!(buf.get_pixel(11,2),Some(0));
        let before = buf.clone();
        assert_eq!(buf.put_pixel(13,0,1),None);
        assert_eq!(buf.put_pixel(-1,0,1),None);
        assert_eq!(buf.put_pixel(0,3,1),None);
        assert_eq!(buf.get_pixel(0,-1),None);
        assert_eq!(buf.get_pixel(13,2),None);
        assert_eq!(buf,before);
    }
}

#[test]
fn rect_is_clipped() {
    let mut buf = PixelBuffer::create(4,4,4).unwrap();
    buf.rect(-2,-2,1,1,7);
    assert_eq!(buf.get_pixel(0,0),Some(7));
    assert_eq!(buf.get_pixel(1,1),Some(7));
    assert_eq!(buf.get_pixel(2,2),Some(0));
    buf.rect(3,0,2,3,9);
    assert_eq!(buf.get_pixel(3,0),Some(0));
    buf.rect(2,2,10,10,9);
    assert_eq!(buf.get_pixel(3,3),Some(9));
    let copy = buf.duplicate();
    buf.put_pixel(3,3,1);
    assert_eq!(copy.get_pixel(3,3),Some(9));
}

#[test]
fn split_merge_4bpp() {
    let buf = gradient(16,16,4,|x,y| ((x+y) & 0xf) as u8);
    let planes = buf.split(0,4,1).expect("split failed");
    assert_eq!(planes.len(),4);
    assert_eq!(planes[3].get_pixel(15,0),Some(1));
    assert_eq!(planes[3].get_pixel(7,0),Some(0));
    let merged = PixelBuffer::merge(&planes,4).expect("merge failed");
    assert_eq!(merged,buf);
}

#[test]
fn split_merge_grid() {
    for (bpp,count,pbpp) in [(8,8,1),(8,4,2),(8,2,4),(4,2,2),(2,2,1),(8,1,8)] {
        let buf = gradient(11,5,bpp,|x,y| (x*37 + y*11) as u8);
        let planes = buf.split(0,count,pbpp).expect("split failed");
        let merged = PixelBuffer::merge(&planes,bpp).expect("merge failed");
        assert_eq!(merged,buf);
    }
}

#[test]
fn split_upper_bits() {
    let buf = gradient(3,1,8,|x,_y| [0xc0,0x80,0x40][x]);
    let planes = buf.split(6,2,1).expect("split failed");
    assert_eq!(planes[0].get_pixel(0,0),Some(1));
    assert_eq!(planes[1].get_pixel(1,0),Some(1));
    assert_eq!(planes[0].get_pixel(1,0),Some(0));
}

#[test]
fn split_out_of_range() {
    let buf = PixelBuffer::create(8,8,8).unwrap();
    assert_eq!(buf.split(6,4,1),Err(Error::PlaneRange));
    assert_eq!(buf.split(0,1,3),Err(Error::UnsupportedBpp));
}

#[test]
fn merge_rejects_mismatch() {
    let a = PixelBuffer::create(4,4,1).unwrap();
    let b = PixelBuffer::create(5,4,1).unwrap();
    assert_eq!(PixelBuffer::merge(&[a.clone(),b],4),Err(Error::PlaneMismatch));
    assert_eq!(PixelBuffer::merge(&[],4),Err(Error::NoPlanes));
    assert_eq!(PixelBuffer::merge(&[a.clone(),a.clone(),a],2),Err(Error::PlaneRange));
}

#[test]
fn munge_demunge() {
    let buf = gradient(12,4,1,|x,_y| (x % 3) as u8);
    let planes = buf.munge(3).expect("munge failed");
    assert_eq!(planes.len(),3);
    for (p,plane) in planes.iter().enumerate() {
        assert_eq!((plane.width(),plane.height()),(4,4));
        for x in 0..4 {
            assert_eq!(plane.get_pixel(x,2),Some((p % 2) as u8));
        }
    }
    let back = PixelBuffer::demunge(&planes,1).expect("demunge failed");
    assert_eq!(back,buf);
}

#[test]
fn munge_8bpp() {
    let buf = gradient(8,2,8,|x,y| (x + 10*y) as u8);
    let planes = buf.munge(4).expect("munge failed");
    assert_eq!(planes[1].row(1).unwrap()[..2].to_vec(),vec![11,15]);
    assert_eq!(PixelBuffer::demunge(&planes,8).unwrap(),buf);
    assert_eq!(buf.munge(3),Err(Error::WidthNotDivisible));
    assert_eq!(PixelBuffer::demunge(&planes,4),Err(Error::PlaneMismatch));
}

#[test]
fn blit_remaps() {
    let mono = gradient(4,4,1,|x,_y| (x & 1) as u8);
    let mut ega = PixelBuffer::create(4,4,4).unwrap();
    ega.blit(&mono,0,0,1,1,8,8);
    assert_eq!(ega.get_pixel(0,0),Some(0));
    assert_eq!(ega.get_pixel(2,1),Some(15));
    assert_eq!(ega.get_pixel(1,1),Some(0));
    let vga = gradient(2,1,8,|x,_y| [0x17,0x03][x]);
    let mut ega = PixelBuffer::create(2,1,4).unwrap();
    ega.blit(&vga,0,0,0,0,2,1);
    assert_eq!(ega.get_pixel(0,0),Some(7));
    let mut mono = PixelBuffer::create(2,1,1).unwrap();
    mono.blit(&vga,0,0,0,0,2,1);
    assert_eq!(mono.get_pixel(0,0),Some(1));
    assert_eq!(mono.get_pixel(1,0),Some(0));
    // remaining table entries
    let bw = gradient(2,1,1,|x,_y| x as u8);
    let mut cga = PixelBuffer::create(2,1,2).unwrap();
    cga.blit(&bw,0,0,0,0,2,1);
    assert_eq!((cga.get_pixel(0,0),cga.get_pixel(1,0)),(Some(0),Some(3)));
    let mut vga = PixelBuffer::create(2,1,8).unwrap();
    vga.blit(&bw,0,0,0,0,2,1);
    assert_eq!((vga.get_pixel(0,0),vga.get_pixel(1,0)),(Some(0),Some(15)));
    let ega = gradient(16,1,4,|x,_y| x as u8);
    let mut mono = PixelBuffer::create(16,1,1).unwrap();
    mono.blit(&ega,0,0,0,0,16,1);
    let mut vga = PixelBuffer::create(16,1,8).unwrap();
    vga.blit(&ega,0,0,0,0,16,1);
    for x in 0..16 {
        assert_eq!(mono.get_pixel(x,0),Some(if x > 7 { 1 } else { 0 }));
        assert_eq!(vga.get_pixel(x,0),Some(x as u8));
    }
}

#[test]
fn blit_clamps_origin() {
    let ones = gradient(4,4,1,|_x,_y| 1);
    let mut ega = PixelBuffer::create(4,4,4).unwrap();
    ega.blit(&ones,0,0,7,0,4,4);
    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(ega.get_pixel(x,y),Some(if x==3 { 15 } else { 0 }));
        }
    }
    let ramp = gradient(4,1,4,|x,_y| x as u8 + 1);
    let mut ega = PixelBuffer::create(4,1,4).unwrap();
    ega.blit(&ramp,9,0,0,0,4,1);
    assert_eq!(ega.get_pixel(0,0),Some(4));
    for x in 1..4 {
        assert_eq!(ega.get_pixel(x,0),Some(0));
    }
}

#[test]
fn blit_from_empty_source() {
    let empty = PixelBuffer::create(0,4,4).unwrap();
    let mut ega = gradient(4,4,4,|x,y| (x + y) as u8);
    let before = ega.clone();
    ega.blit(&empty,0,0,0,0,4,4);
    ega.blit(&empty,3,3,2,2,4,4);
    assert_eq!(ega,before);
}

#[test]
fn blit_passes_through_unlisted() {
    // 2 -> 4 is not in the remap table
    let cga = gradient(1,1,2,|_x,_y| 2);
    let mut ega = PixelBuffer::create(1,1,4).unwrap();
    ega.blit(&cga,0,0,0,0,1,1);
    assert_eq!(ega.get_pixel(0,0),Some(2));
}

#[test]
fn unpack_planes() {
    let mut buf = gradient(10,2,4,|x,y| if y==0 { (x & 0xf) as u8 } else { 0xf });
    let before = buf.clone();
    buf.unpack().expect("unpack failed");
    assert_eq!(buf.layout(),Layout::Planar);
    assert_eq!(buf.stride(),2);
    assert_eq!(buf.as_bytes().len(),2*2*4);
    // blue plane, row 0: 0101010101 with the last two bits right-aligned
    assert_eq!(buf.plane_row(0,0).unwrap().to_vec(),vec![0x55,0x01]);
    assert_eq!(buf.plane_row(3,0).unwrap().to_vec(),vec![0x00,0x03]);
    assert_eq!(buf.plane_row(2,1).unwrap().to_vec(),vec![0xff,0x03]);
    for y in 0..2 {
        for x in 0..10 {
            assert_eq!(buf.get_pixel(x,y),before.get_pixel(x,y));
        }
    }
    let mut mono = PixelBuffer::create(8,1,1).unwrap();
    assert_eq!(mono.unpack(),Err(Error::UnsupportedBpp));
}

#[test]
fn ega_planes() {
    let buf = gradient(4,1,4,|x,_y| [1,2,4,8][x]);
    let [b,g,r,i] = buf.split_ega().expect("split failed");
    assert_eq!((b.get_pixel(0,0),g.get_pixel(1,0),r.get_pixel(2,0),i.get_pixel(3,0)),(Some(1),Some(1),Some(1),Some(1)));
    let merged = PixelBuffer::merge_ega(&[b,g,r,i]).expect("merge failed");
    assert_eq!(merged.bpp(),Bpp::Eight);
    assert_eq!(merged.get_pixel(3,0),Some(8));
}
