#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use lumeq_image as image;

#[doc(inline)]
pub use lumeq_imgproc as imgproc;

#[doc(inline)]
pub use lumeq_io as io;
