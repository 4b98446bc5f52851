use corewalk_core::{Address, AddressSpace, Fault, TreeNodeLayout};

/// Red-Black tree node color
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RbColor {
    Red,
    Black,
}

/// A `struct rb_node` read out of the image, with the parent/color word
/// already split.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RbNode {
    pub address: Address,
    pub parent: Address,
    pub color: RbColor,
    pub left: Address,
    pub right: Address,
}

impl RbNode {
    /// Read and decode the node at `address`.
    pub fn read<S>(space: &S, address: Address, layout: &TreeNodeLayout) -> Result<Self, Fault>
    where
        S: AddressSpace + ?Sized,
    {
        let word = |offset: usize| -> Result<u64, Fault> {
            let field = address.field(offset).ok_or(Fault::OutOfRange {
                address,
                len: layout.arch.word_size(),
            })?;
            space.read_word(field, layout.arch)
        };

        let (parent, is_black) = TreeNodeLayout::decode_parent_color(word(layout.parent_color)?);
        Ok(Self {
            address,
            parent,
            color: if is_black { RbColor::Black } else { RbColor::Red },
            left: Address(word(layout.left)?),
            right: Address(word(layout.right)?),
        })
    }

    pub fn is_red(&self) -> bool {
        self.color == RbColor::Red
    }

    pub fn is_black(&self) -> bool {
        self.color == RbColor::Black
    }
}
