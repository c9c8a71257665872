use crate::codec::{ByteReader, Decode, Encode};
use crate::error::CodecError;

/// An assigned id together with the items collected under it.
///
/// The id is fixed at creation; the items only ever grow. This is the value
/// the [`VariantAggregator`](crate::VariantAggregator) stores per variant.
///
/// Encoded as the id followed by the item list.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierContext<I, T> {
    id: I,
    items: Vec<T>,
}
impl<I: Copy, T> IdentifierContext<I, T> {
    #[must_use]
    pub fn new(id: I) -> Self {
        Self {
            id,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_items(id: I, items: Vec<T>) -> Self {
        Self { id, items }
    }

    #[must_use]
    pub fn id(&self) -> I {
        self.id
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}
impl<I, T> Extend<T> for IdentifierContext<I, T> {
    fn extend<It: IntoIterator<Item = T>>(&mut self, iter: It) {
        self.items.extend(iter);
    }
}
impl<I: Encode, T: Encode> Encode for IdentifierContext<I, T> {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.id.encode_into(buf);
        self.items.encode_into(buf);
    }
}
impl<I: Decode, T: Decode> Decode for IdentifierContext<I, T> {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let id = I::decode_from(reader)?;
        let items = Vec::decode_from(reader)?;
        Ok(Self { id, items })
    }
}
