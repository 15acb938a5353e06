//! Static Huffman Coding
//!
//! This is the byte oriented Huffman coder used to store graphics chunks in
//! 1990s DOS game archives.  The tree is stored as a dictionary of 256 nodes,
//! each with two 16 bit children.  A child below 256 is a literal byte, otherwise
//! it refers to node `child - 256`.  Node 254 is always the root (head node), and
//! node 255 is an unused all-zero record that is written but never read.
//!
//! * The tree is built from a histogram by repeatedly joining the two lowest
//!   frequency slots, ties going to the lowest index, so that the dictionary
//!   matches what the original tools produce.
//! * The compressed stream carries no length and no terminator, the caller has to
//!   know the expanded length.
//! * Bits are packed starting from bit 0 of each byte.

use bit_vec::BitVec;
use num_derive::FromPrimitive;
use std::io::{Read,Write,Seek,SeekFrom,ErrorKind};
use crate::tools::bits::{bits_to_bytes_lsb0,bytes_to_bits_lsb0};
use crate::{Error,STDRESULT};

/// index of the root node
pub const HEAD_NODE: usize = 254;
/// number of records written to a dictionary
pub const DICT_NODES: usize = 256;
/// number of records read from a dictionary, the last one is padding
const DICT_NODES_READ: usize = 255;
/// frequency marking a slot that was joined into another one.
/// Counts at or above `UNSELECTABLE` could never be picked, so the
/// total of all counts has to stay below it.
const RETIRED: u32 = 0xffff_ffff;
const UNSELECTABLE: u32 = 0x7fff_ffff;
/// compressed chunks shorter than this get the extra trailing byte in `TrailMode::Small`
const SMALL_CHUNK: usize = 60000;

/// Controls the extra byte some archive tools leave at the end of a compressed chunk
#[derive(FromPrimitive,Clone,Copy,Debug,PartialEq,Eq)]
pub enum TrailMode {
    /// only write the pending partial byte, if any
    None = 0,
    /// when the stream ends on a byte boundary write one zero byte anyway
    Always = 1,
    /// as `Always`, but only for inputs shorter than 60000 bytes
    Small = 2
}

/// Byte counts used to build a tree
#[derive(Clone,Debug,PartialEq)]
pub struct FrequencyTable {
    counts: [u32;256]
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self {
            counts: [0;256]
        }
    }
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn from_counts(counts: [u32;256]) -> Self {
        Self {
            counts
        }
    }
    pub fn from_bytes(dat: &[u8]) -> Self {
        let mut ans = Self::new();
        ans.accumulate(dat);
        ans
    }
    /// Add the bytes of one chunk, so one tree can serve a whole archive
    pub fn accumulate(&mut self,dat: &[u8]) {
        for b in dat {
            self.counts[*b as usize] = self.counts[*b as usize].saturating_add(1);
        }
    }
    pub fn counts(&self) -> &[u32;256] {
        &self.counts
    }
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| *c as u64).sum()
    }
}

/// Dictionary record
#[derive(Clone,Copy,Default,Debug,PartialEq)]
pub struct Node {
    pub bit0: u16,
    pub bit1: u16
}

impl Node {
    fn child(&self,bit: bool) -> u16 {
        match bit {
            true => self.bit1,
            false => self.bit0
        }
    }
}

/// Code for one byte, bits are in the order they are written
#[derive(Clone,Debug,Default,PartialEq)]
pub struct Code {
    path: BitVec
}

impl Code {
    pub fn len(&self) -> usize {
        self.path.len()
    }
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
    /// The first 32 bits of the code, the first bit is bit 0
    pub fn pattern(&self) -> u32 {
        let mut ans = 0;
        for (i,bit) in self.path.iter().take(32).enumerate() {
            ans |= (bit as u32) << i;
        }
        ans
    }
    pub fn path(&self) -> &BitVec {
        &self.path
    }
}

/// Node table and codebook for one compression or expansion session.
/// Build the tree from a histogram, or read it from a dictionary, then
/// compress or expand any number of chunks with it.
pub struct HuffmanCodec {
    nodes: [Node;DICT_NODES],
    codes: Vec<Code>
}

impl Default for HuffmanCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl HuffmanCodec {
    /// codec with an all-zero dictionary, call `build_tree` or `read_dictionary` next
    pub fn new() -> Self {
        Self {
            nodes: [Node::default();DICT_NODES],
            codes: vec![Code::default();256]
        }
    }
    /// Create a session from a histogram
    pub fn from_frequencies(freq: &FrequencyTable) -> Result<Self,Error> {
        let mut ans = Self::new();
        ans.build_tree(freq)?;
        Ok(ans)
    }
    pub fn nodes(&self) -> &[Node;DICT_NODES] {
        &self.nodes
    }
    pub fn code(&self,byte: u8) -> &Code {
        &self.codes[byte as usize]
    }
    /// Build the node table from a histogram, then derive the codebook.
    /// Every byte value gets a code, including those with zero count.
    pub fn build_tree(&mut self,freq: &FrequencyTable) -> Result<(),Error> {
        if freq.total() >= UNSELECTABLE as u64 {
            log::error!("frequency total {} is too large",freq.total());
            return Err(Error::FrequencyOverflow);
        }
        // slots start out as bytes, then come to hold node references (256 + index)
        let mut value: [u16;256] = [0;256];
        let mut prob: [u32;256] = [0;256];
        for i in 0..256 {
            value[i] = i as u16;
            prob[i] = freq.counts[i];
        }
        let mut nodes = [Node::default();DICT_NODES];
        let mut worknode = 0;
        loop {
            let code0 = Self::lowest(&prob,None);
            let code1 = Self::lowest(&prob,code0);
            let (code0,code1) = match (code0,code1) {
                (Some(c0),Some(c1)) => (c0,c1),
                (Some(c0),None) => {
                    if value[c0] as usize != 256 + HEAD_NODE {
                        log::error!("last slot holds {} rather than the head node",value[c0]);
                        return Err(Error::TreeInconsistent);
                    }
                    break;
                },
                _ => {
                    log::error!("no slots left while building tree");
                    return Err(Error::TreeInconsistent);
                }
            };
            if worknode > HEAD_NODE {
                log::error!("tree needs more than {} nodes",HEAD_NODE + 1);
                return Err(Error::TreeInconsistent);
            }
            nodes[worknode] = Node {
                bit0: value[code0],
                bit1: value[code1]
            };
            value[code0] = (256 + worknode) as u16;
            prob[code0] += prob[code1];
            prob[code1] = RETIRED;
            worknode += 1;
        }
        self.nodes = nodes;
        log::debug!("built Huffman tree from {} bytes",freq.total());
        self.derive_code_table()
    }
    /// lowest index holding the lowest selectable frequency, optionally skipping one slot
    fn lowest(prob: &[u32;256],skip: Option<usize>) -> Option<usize> {
        let mut ans = None;
        let mut low = UNSELECTABLE;
        for (i,p) in prob.iter().enumerate() {
            if *p < low && Some(i) != skip {
                ans = Some(i);
                low = *p;
            }
        }
        ans
    }
    /// Walk the tree from the head node recording the path to every literal,
    /// child 0 appends a 0 bit, child 1 appends a 1 bit.
    /// Codes over 32 bits are allowed, but cannot be handled by some legacy tools.
    pub fn derive_code_table(&mut self) -> Result<(),Error> {
        let mut codes = vec![Code::default();256];
        let mut visited = [false;DICT_NODES];
        let mut stack: Vec<(u16,BitVec)> = vec![((256 + HEAD_NODE) as u16,BitVec::new())];
        while let Some((curr,path)) = stack.pop() {
            if curr < 256 {
                if path.len() > 32 {
                    log::warn!("code for byte {} has {} bits",curr,path.len());
                }
                codes[curr as usize] = Code { path };
                continue;
            }
            let idx = (curr & 0xff) as usize;
            if visited[idx] {
                log::error!("node {} is reached twice",idx);
                return Err(Error::TreeInconsistent);
            }
            visited[idx] = true;
            let mut path1 = path.clone();
            path1.push(true);
            let mut path0 = path;
            path0.push(false);
            stack.push((self.nodes[idx].bit1,path1));
            stack.push((self.nodes[idx].bit0,path0));
        }
        self.codes = codes;
        Ok(())
    }
    /// Load the dictionary from a buffer holding at least 255 records, then derive the codebook
    pub fn load_dictionary(&mut self,dat: &[u8]) -> Result<(),Error> {
        if dat.len() < DICT_NODES_READ*4 {
            log::error!("dictionary has {} bytes",dat.len());
            return Err(Error::DictionaryTooShort);
        }
        for (i,rec) in dat.chunks_exact(4).take(DICT_NODES_READ).enumerate() {
            self.nodes[i] = Node {
                bit0: u16::from_le_bytes([rec[0],rec[1]]),
                bit1: u16::from_le_bytes([rec[2],rec[3]])
            };
        }
        self.nodes[DICT_NODES-1] = Node::default();
        self.derive_code_table()
    }
    /// Read the dictionary from `offset` within an archive, then derive the codebook
    pub fn read_dictionary<R: Read + Seek>(&mut self,src: &mut R,offset: u64) -> STDRESULT {
        let mut dat = vec![0;DICT_NODES_READ*4];
        src.seek(SeekFrom::Start(offset))?;
        match src.read_exact(&mut dat) {
            Ok(()) => {},
            Err(e) if e.kind()==ErrorKind::UnexpectedEof => return Err(Box::new(Error::DictionaryTooShort)),
            Err(e) => return Err(Box::new(e))
        }
        self.load_dictionary(&dat)?;
        log::debug!("read Huffman dictionary at offset {}",offset);
        Ok(())
    }
    /// The dictionary as 256 records of two little endian u16
    pub fn dictionary_bytes(&self) -> Vec<u8> {
        let mut ans = Vec::with_capacity(DICT_NODES*4);
        for node in self.nodes.iter() {
            ans.extend_from_slice(&u16::to_le_bytes(node.bit0));
            ans.extend_from_slice(&u16::to_le_bytes(node.bit1));
        }
        ans
    }
    pub fn write_dictionary<W: Write>(&self,dest: &mut W) -> STDRESULT {
        dest.write_all(&self.dictionary_bytes())?;
        Ok(())
    }
    /// Compress `input`, producing at most `capacity` bytes.  If the capacity is reached
    /// the output is silently truncated.  Fails if some input byte has no code, which
    /// can only happen with a loaded dictionary that does not cover every byte.
    pub fn compress(&self,input: &[u8],capacity: usize,trail: TrailMode) -> Result<Vec<u8>,Error> {
        if capacity == 0 {
            return Ok(Vec::new());
        }
        let cap_bits = capacity * 8;
        let mut bits = BitVec::new();
        'input: for c in input {
            let code = &self.codes[*c as usize];
            if code.is_empty() {
                log::error!("byte {} has no code",c);
                return Err(Error::TreeInconsistent);
            }
            for bit in code.path.iter() {
                bits.push(bit);
                if bits.len() >= cap_bits {
                    break 'input;
                }
            }
        }
        let aligned = bits.len() % 8 == 0;
        let mut ans = bits_to_bytes_lsb0(&bits);
        let extra = match trail {
            TrailMode::None => false,
            TrailMode::Always => true,
            TrailMode::Small => input.len() < SMALL_CHUNK
        };
        if aligned && extra && ans.len() < capacity {
            ans.push(0);
        }
        log::trace!("compressed {} bytes into {}",input.len(),ans.len());
        Ok(ans)
    }
    /// Expand until `out_len` bytes are produced or the input runs out
    pub fn expand(&self,input: &[u8],out_len: usize) -> Vec<u8> {
        let mut ans = Vec::with_capacity(out_len);
        if out_len == 0 {
            return ans;
        }
        let mut curr = HEAD_NODE;
        for bit in bytes_to_bits_lsb0(input).iter() {
            let next = self.nodes[curr].child(bit);
            if next < 256 {
                ans.push(next as u8);
                curr = HEAD_NODE;
                if ans.len() >= out_len {
                    break;
                }
            } else {
                curr = (next & 0xff) as usize;
            }
        }
        log::trace!("expanded {} bytes into {}",input.len(),ans.len());
        ans
    }
}

// *************** TESTS *****************

/// Kraft sum is exactly one if the code lengths can be paired off from the deepest level up
#[cfg(test)]
fn kraft_sum_is_one(codec: &HuffmanCodec) -> bool {
    let mut per_len = vec![0u64;257];
    for b in 0..=255u8 {
        let len = codec.code(b).len();
        if len == 0 || len > 256 {
            return false;
        }
        per_len[len] += 1;
    }
    let mut carry = 0;
    for len in (1..=256).rev() {
        let total = per_len[len] + carry;
        if total % 2 != 0 {
            return false;
        }
        carry = total / 2;
    }
    carry == 1
}

#[test]
fn tree_from_short_text() {
    let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_bytes(b"AAAABBBC")).expect("tree failed");
    assert_eq!(codec.code(b'A').len(),1);
    assert_eq!(codec.code(b'B').len(),2);
    assert_eq!(codec.code(b'C').len(),3);
    assert_eq!(codec.code(b'A').pattern(),1);
    assert_eq!(codec.code(b'B').pattern(),2);
    assert_eq!(codec.code(b'C').pattern(),4);
    for b in 0..=255u8 {
        assert!(codec.code(b).len() >= codec.code(b'A').len());
    }
    assert!(kraft_sum_is_one(&codec));
}

#[test]
fn compression_works() {
    let test_data = b"AAAABBBC";
    let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_bytes(test_data)).expect("tree failed");
    let compressed = codec.compress(test_data,100,TrailMode::None).expect("compression failed");
    assert_eq!(compressed,hex::decode("af12").unwrap());
    assert_eq!(codec.expand(&compressed,test_data.len()),test_data.to_vec());

    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let huff_str = "97 DC C8 DC C8 5D 32 77 AD 18 40 EA 7F DF 16 ED 0F 36 72 97 CC 4B";
    let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_bytes(test_data)).expect("tree failed");
    let compressed = codec.compress(test_data,1000,TrailMode::None).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());
}

#[test]
fn trailing_byte() {
    let test_data = b"AAAAAAAA";
    let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_bytes(test_data)).expect("tree failed");
    assert_eq!(codec.compress(test_data,10,TrailMode::None).unwrap(),vec![0xff]);
    assert_eq!(codec.compress(test_data,10,TrailMode::Always).unwrap(),vec![0xff,0x00]);
    assert_eq!(codec.compress(test_data,10,TrailMode::Small).unwrap(),vec![0xff,0x00]);
    assert_eq!(codec.compress(test_data,1,TrailMode::Always).unwrap(),vec![0xff]);
    // a partial byte is never followed by a second one
    assert_eq!(codec.compress(b"AAAA",10,TrailMode::Always).unwrap(),vec![0x0f]);
    let big = vec![b'A';SMALL_CHUNK];
    assert_eq!(codec.compress(&big,SMALL_CHUNK,TrailMode::Small).unwrap().len(),SMALL_CHUNK/8);
    assert_eq!(codec.compress(&big,SMALL_CHUNK,TrailMode::Always).unwrap().len(),SMALL_CHUNK/8 + 1);
}

#[test]
fn truncates_at_capacity() {
    let test_data = b"AAAABBBC";
    let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_bytes(test_data)).expect("tree failed");
    assert_eq!(codec.compress(test_data,1,TrailMode::Always).unwrap(),vec![0xaf]);
    assert_eq!(codec.compress(test_data,0,TrailMode::Always).unwrap(),Vec::<u8>::new());
}

#[test]
fn expand_budgets() {
    let test_data = b"AAAABBBC";
    let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_bytes(test_data)).expect("tree failed");
    assert_eq!(codec.expand(&[0xaf,0x12],3),b"AAA".to_vec());
    assert_eq!(codec.expand(&[0xaf],100),b"AAAABB".to_vec());
    assert_eq!(codec.expand(&[0xaf,0x12],0),Vec::<u8>::new());
}

#[test]
fn invertibility() {
    let mut test_data = Vec::new();
    for i in 0..5000u32 {
        test_data.push(((i * 7919) % 251) as u8 & 0x3f);
        test_data.push((i % 13) as u8);
    }
    let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_bytes(&test_data)).expect("tree failed");
    assert!(kraft_sum_is_one(&codec));
    for trail in [TrailMode::None,TrailMode::Always,TrailMode::Small] {
        let compressed = codec.compress(&test_data,test_data.len()*2,trail).expect("compression failed");
        assert!(compressed.len() < test_data.len());
        assert_eq!(codec.expand(&compressed,test_data.len()),test_data);
    }
}

#[test]
fn shared_tree_for_many_chunks() {
    let chunks: [&[u8];3] = [b"tiles tiles tiles",b"sprites",&[0,1,2,3,255,254,0,0]];
    let mut freq = FrequencyTable::new();
    for chunk in chunks {
        freq.accumulate(chunk);
    }
    assert_eq!(freq.total(),32);
    let codec = HuffmanCodec::from_frequencies(&freq).expect("tree failed");
    for chunk in chunks {
        let compressed = codec.compress(chunk,chunk.len()*2,TrailMode::Always).expect("compression failed");
        assert_eq!(codec.expand(&compressed,chunk.len()),chunk.to_vec());
    }
}

#[test]
fn uniform_histogram() {
    let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_counts([1;256])).expect("tree failed");
    for b in 0..=255u8 {
        assert_eq!(codec.code(b).len(),8);
    }
    assert!(kraft_sum_is_one(&codec));
}

#[test]
fn tree_fills_every_node() {
    // 256 leaves always take exactly 255 internal nodes, the last one is the head
    let mut counts = [0;256];
    counts[0x20] = 1000;
    counts[0x41] = 3;
    for skewed in [counts,[1;256]] {
        let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_counts(skewed)).expect("tree failed");
        assert_ne!(codec.nodes()[HEAD_NODE],Node::default());
        assert_eq!(codec.nodes()[DICT_NODES-1],Node::default());
        assert!(kraft_sum_is_one(&codec));
    }
}

#[test]
fn dictionary_layout() {
    let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_bytes(b"AAAABBBC")).expect("tree failed");
    let dict = codec.dictionary_bytes();
    assert_eq!(dict.len(),1024);
    assert_eq!(dict[0..12].to_vec(),hex::decode("000001000001020001010300").unwrap());
    assert_eq!(dict[1016..1024].to_vec(),hex::decode("fd01410000000000").unwrap());
    let mut written: Vec<u8> = Vec::new();
    codec.write_dictionary(&mut written).expect("write failed");
    assert_eq!(written,dict);
}

#[test]
fn dictionary_round_trip() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let codec = HuffmanCodec::from_frequencies(&FrequencyTable::from_bytes(test_data)).expect("tree failed");
    let archive = [b"junk".to_vec(),codec.dictionary_bytes()].concat();
    let mut loaded = HuffmanCodec::new();
    loaded.read_dictionary(&mut std::io::Cursor::new(&archive),4).expect("read failed");
    assert_eq!(loaded.nodes(),codec.nodes());
    for b in 0..=255u8 {
        assert_eq!(loaded.code(b),codec.code(b));
    }
    let compressed = codec.compress(test_data,200,TrailMode::None).unwrap();
    assert_eq!(loaded.expand(&compressed,test_data.len()),test_data.to_vec());
    let mut short = HuffmanCodec::new();
    assert!(short.read_dictionary(&mut std::io::Cursor::new(&archive),10).is_err());
    assert_eq!(short.load_dictionary(&archive[0..100]),Err(Error::DictionaryTooShort));
}

#[test]
fn rejects_bad_trees() {
    let mut counts = [0;256];
    counts[7] = UNSELECTABLE;
    assert_eq!(HuffmanCodec::from_frequencies(&FrequencyTable::from_counts(counts)).err(),Some(Error::FrequencyOverflow));
    // head node refers to itself
    let mut dict = vec![0;1024];
    dict[HEAD_NODE*4..HEAD_NODE*4+4].copy_from_slice(&[0xfe,0x01,0xfe,0x01]);
    let mut codec = HuffmanCodec::new();
    assert_eq!(codec.load_dictionary(&dict),Err(Error::TreeInconsistent));
    // head node only knows two bytes
    dict[HEAD_NODE*4..HEAD_NODE*4+4].copy_from_slice(&[0x41,0x00,0x42,0x00]);
    codec.load_dictionary(&dict).expect("load failed");
    assert_eq!(codec.compress(b"ABBA",10,TrailMode::None).unwrap(),vec![0x06]);
    assert_eq!(codec.compress(b"ABC",10,TrailMode::None),Err(Error::TreeInconsistent));
}
