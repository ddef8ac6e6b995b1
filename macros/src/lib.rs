extern crate proc_macro;

macro_rules! bail {
    ($item:expr, $fmt:literal $($tts:tt)*) => {
        return Err(Error::new_spanned(
            &$item,
            format!(concat!("memoget: ", $fmt) $($tts)*)
        ))
    }
}

mod memoize;

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Error, Result, parse_quote};

/// Memoize the getters in an impl block.
///
/// Every method in the block must be a zero-argument `&self` getter
/// returning an owned, cloneable value. The original methods stay callable
/// as the raw computation; the memoized variants are read through the
/// handle returned by `memo` on `Rc<T>`.
///
/// ```ignore
/// struct Image {
///     pixels: RefCell<Vec<u8>>,
/// }
///
/// #[memoize]
/// impl Image {
///     /// Recomputed whenever the pixel buffer changes.
///     #[key(|this| this.pixels.borrow().clone())]
///     fn brightness(&self) -> u64 {
///         self.pixels.borrow().iter().map(|&p| p as u64).sum()
///     }
/// }
///
/// let image = Rc::new(Image { pixels: RefCell::new(vec![100, 200]) });
/// image.memo().brightness();
/// ```
///
/// An accessor without a `#[key(..)]` attribute computes once per instance.
/// An accessor whose return type literally names `Result` caches only
/// successful values; errors propagate to the caller and are never cached.
#[proc_macro_attribute]
pub fn memoize(_: TokenStream, stream: TokenStream) -> TokenStream {
    let block = syn::parse_macro_input!(stream as syn::ItemImpl);
    memoize::expand(block)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
