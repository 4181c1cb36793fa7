//! Byte order normalization for fixed width scalars.
//!
//! Binary legacy VTK payloads are stored big endian on every platform. Readers
//! load raw bytes into typed buffers and then reorder them in place; writers do
//! the reverse right before dumping a buffer.
//!
//! Only scalar types with an even byte width (or a single byte) implement
//! [`SwitchByteOrder`]. The implementing macro contains a const assertion, so an
//! odd width can never be instantiated.

use byteorder::{ByteOrder, NativeEndian};

/// A fixed width scalar whose byte representation can be reversed.
pub trait SwitchByteOrder: Copy + bytemuck::Pod {
    /// Return a value with the same bit pattern but with its bytes reversed.
    fn switch_byte_order(self) -> Self;
}

macro_rules! impl_switch_byte_order {
    ($type:ty) => {
        impl SwitchByteOrder for $type {
            #[inline]
            fn switch_byte_order(self) -> $type {
                self
            }
        }
    };
    (float $type:ty) => {
        const _: () = assert!(
            ::std::mem::size_of::<$type>() % 2 == 0,
            "byte order can only be switched for even sized types"
        );
        impl SwitchByteOrder for $type {
            #[inline]
            fn switch_byte_order(self) -> $type {
                <$type>::from_bits(self.to_bits().swap_bytes())
            }
        }
    };
    (int $type:ty) => {
        const _: () = assert!(
            ::std::mem::size_of::<$type>() % 2 == 0,
            "byte order can only be switched for even sized types"
        );
        impl SwitchByteOrder for $type {
            #[inline]
            fn switch_byte_order(self) -> $type {
                self.swap_bytes()
            }
        }
    };
}

impl_switch_byte_order!(u8);
impl_switch_byte_order!(i8);
impl_switch_byte_order!(int u16);
impl_switch_byte_order!(int i16);
impl_switch_byte_order!(int u32);
impl_switch_byte_order!(int i32);
impl_switch_byte_order!(int u64);
impl_switch_byte_order!(int i64);
impl_switch_byte_order!(float f32);
impl_switch_byte_order!(float f64);

/// Reverse the byte order of a single value.
#[inline]
pub fn switch_byte_order<T: SwitchByteOrder>(value: T) -> T {
    value.switch_byte_order()
}

/// Reverse the byte order of every element in `array`.
pub fn switch_byte_order_of_slice<T: SwitchByteOrder>(array: &mut [T]) {
    for elem in array.iter_mut() {
        *elem = elem.switch_byte_order();
    }
}

/// Reverse the byte order of the first `count` elements of `array`.
///
/// A `count` larger than the array is clamped to its length.
pub fn switch_byte_order_of_array<T: SwitchByteOrder>(array: &mut [T], count: usize) {
    let count = count.min(array.len());
    switch_byte_order_of_slice(&mut array[..count]);
}

/// Returns `true` if values stored with byte order `BO` must be reordered to be read natively.
pub fn needs_swap<BO: ByteOrder>() -> bool {
    let mut buf = [0u8; 2];
    BO::write_u16(&mut buf, 1);
    NativeEndian::read_u16(&buf) != 1
}

/// Convert a buffer read verbatim from a `BO` ordered source into native byte order.
pub fn to_native<BO: ByteOrder, T: SwitchByteOrder>(array: &mut [T]) {
    if needs_swap::<BO>() {
        switch_byte_order_of_slice(array);
    }
}

/// Convert a native buffer into byte order `BO` before it is written verbatim.
///
/// Byte swapping is an involution, so this is the same operation as [`to_native`].
pub fn from_native<BO: ByteOrder, T: SwitchByteOrder>(array: &mut [T]) {
    to_native::<BO, T>(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian};

    #[test]
    fn single_byte_is_unchanged() {
        assert_eq!(switch_byte_order(0xABu8), 0xAB);
        assert_eq!(switch_byte_order(-5i8), -5);
    }

    #[test]
    fn integer_bytes_are_reversed() {
        assert_eq!(switch_byte_order(0x1234u16), 0x3412);
        assert_eq!(switch_byte_order(0x1234_5678u32), 0x7856_3412);
        assert_eq!(
            switch_byte_order(0x0102_0304_0506_0708u64),
            0x0807_0605_0403_0201
        );
        assert_eq!(switch_byte_order(1i32), 0x0100_0000);
    }

    #[test]
    fn float_bit_patterns_are_reversed() {
        let v = 0.15625_f32; // 0x3E200000
        assert_eq!(switch_byte_order(v).to_bits(), 0x0000_203E);
        let d = 1.0_f64;
        assert_eq!(switch_byte_order(d).to_bits(), 0x0000_0000_0000_F03F);
    }

    #[test]
    fn switching_twice_is_identity() {
        for &v in &[0.0f32, -1.5, 3.25e7, f32::MIN_POSITIVE, f32::MAX] {
            assert_eq!(switch_byte_order(switch_byte_order(v)).to_bits(), v.to_bits());
        }
        for &v in &[0u32, 1, 0xDEAD_BEEF, u32::MAX] {
            assert_eq!(switch_byte_order(switch_byte_order(v)), v);
        }
        let nan = f64::from_bits(0x7FF8_0000_0000_0001);
        assert_eq!(
            switch_byte_order(switch_byte_order(nan)).to_bits(),
            nan.to_bits()
        );
    }

    #[test]
    fn array_switch_is_involution() {
        let orig = vec![1u32, 2, 0xFF00_00FF, 42, 7];
        let mut arr = orig.clone();
        switch_byte_order_of_slice(&mut arr);
        assert_eq!(arr[0], 0x0100_0000);
        switch_byte_order_of_slice(&mut arr);
        assert_eq!(arr, orig);
    }

    #[test]
    fn array_switch_respects_count() {
        let mut arr = vec![1u16, 1, 1];
        switch_byte_order_of_array(&mut arr, 2);
        assert_eq!(arr, vec![0x0100, 0x0100, 1]);

        // Counts past the end are clamped.
        let mut arr = vec![1u16, 1];
        switch_byte_order_of_array(&mut arr, 10);
        assert_eq!(arr, vec![0x0100, 0x0100]);
    }

    #[test]
    fn big_endian_bytes_become_native() {
        let file_bytes = [0u8, 0, 0, 1, 0, 0, 1, 2];
        let mut buf = vec![0u32; 2];
        bytemuck::cast_slice_mut::<u32, u8>(&mut buf).copy_from_slice(&file_bytes);
        to_native::<BigEndian, _>(&mut buf);
        assert_eq!(buf, vec![1, 258]);

        from_native::<BigEndian, _>(&mut buf);
        assert_eq!(bytemuck::cast_slice::<u32, u8>(&buf), &file_bytes[..]);

        assert!(needs_swap::<BigEndian>() != needs_swap::<LittleEndian>());
        assert!(!needs_swap::<NativeEndian>());
    }
}
