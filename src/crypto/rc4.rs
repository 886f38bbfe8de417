use zeroize::{Zeroize, ZeroizeOnDrop};

const STATE_SIZE: usize = 256;

/// RC4 keystream cursor.
///
/// Every call to [`Rc4::process`] continues the keystream where the previous call stopped, so the order of
/// calls defines the output. Cloning snapshots the cursor.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Rc4 {
    i: u8,
    j: u8,
    state: [u8; STATE_SIZE],
}

impl Rc4 {
    pub fn new(key: &[u8]) -> Self {
        let mut state = [0x00; STATE_SIZE];
        for (i, item) in state.iter_mut().enumerate() {
            *item = i as u8;
        }

        let mut j = 0u8;
        for i in 0..STATE_SIZE {
            j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
            state.swap(i, usize::from(j));
        }

        Self { i: 0, j: 0, state }
    }

    pub fn process(&mut self, message: &[u8]) -> Vec<u8> {
        message
            .iter()
            .map(|byte| {
                self.i = self.i.wrapping_add(1);
                self.j = self.j.wrapping_add(self.state[usize::from(self.i)]);
                self.state.swap(usize::from(self.i), usize::from(self.j));
                let idx = self.state[usize::from(self.i)].wrapping_add(self.state[usize::from(self.j)]);

                byte ^ self.state[usize::from(idx)]
            })
            .collect()
    }
}

impl std::fmt::Debug for Rc4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Rc4")
    }
}
