//! Bit vector packing in LSB-first order.
//!
//! The `bit_vec` crate only packs MSB first.  The Huffman streams fill each byte
//! starting from bit 0, so we do the conversion here, assuming starting alignment.

use bit_vec::BitVec;

/// Pack bits so that bit `8*i + b` lands in bit `b` of byte `i`.
/// A trailing partial byte keeps its bits at the bottom.
pub fn bits_to_bytes_lsb0(bits: &BitVec) -> Vec<u8> {
    let mut ans = Vec::with_capacity((bits.len() + 7) / 8);
    let mut val: u8 = 0;
    for (i,bit) in bits.iter().enumerate() {
        val |= (bit as u8) << (i % 8);
        if i % 8 == 7 {
            ans.push(val);
            val = 0;
        }
    }
    if bits.len() % 8 > 0 {
        ans.push(val);
    }
    ans
}

/// Unpack bytes so that bit `b` of byte `i` becomes bit `8*i + b`.
pub fn bytes_to_bits_lsb0(bytes: &[u8]) -> BitVec {
    let mut ans = BitVec::with_capacity(bytes.len() * 8);
    for val in bytes {
        for b in 0..8 {
            ans.push((val & (1 << b)) != 0);
        }
    }
    ans
}

#[test]
fn lsb_packing() {
    let mut bits = BitVec::new();
    for b in [true,true,true,true,false,true,false,true,false,true,false,false,true] {
        bits.push(b);
    }
    assert_eq!(bits_to_bytes_lsb0(&bits),vec![0xaf,0x12]);
}

#[test]
fn lsb_unpacking() {
    let bits = bytes_to_bits_lsb0(&[0x01,0x80]);
    assert_eq!(bits.len(),16);
    assert!(bits[0]);
    assert!(!bits[7]);
    assert!(bits[15]);
    assert_eq!(bits.iter().filter(|b| *b).count(),2);
}
