use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::StructureError;

/// Orbital-space category of an index.
///
/// The core never interprets the category beyond equality: it only decides which
/// index ranges a task loops over in the emitted code.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
pub enum Space {
    #[display(fmt = "c")]
    Closed,
    #[display(fmt = "x")]
    Active,
    #[display(fmt = "a")]
    Virtual,
    #[display(fmt = "g")]
    General,
}

impl Space {
    pub fn label(&self) -> char {
        match self {
            Space::Closed => 'c',
            Space::Active => 'x',
            Space::Virtual => 'a',
            Space::General => 'g',
        }
    }
}

impl TryFrom<char> for Space {
    type Error = StructureError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            'c' => Ok(Space::Closed),
            'x' => Ok(Space::Active),
            'a' => Ok(Space::Virtual),
            'g' => Ok(Space::General),
            _ => Err(StructureError::UnknownSpace(value)),
        }
    }
}

#[test]
fn space_labels() {
    for s in [Space::Closed, Space::Active, Space::Virtual, Space::General] {
        assert_eq!(Space::try_from(s.label()), Ok(s));
        assert_eq!(s.to_string(), s.label().to_string());
    }
    assert_eq!(Space::try_from('q'), Err(StructureError::UnknownSpace('q')));
}
