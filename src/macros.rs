pub use enclose::*;

#[macro_export]
macro_rules! computed {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::Computed::new($crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }))
    };
    (=> $($b:tt)*) => {
        $crate::Computed::new(move || { $($b)* })
    };
}

#[macro_export]
macro_rules! pure {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::Computed::pure($crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }))
    };
    (=> $($b:tt)*) => {
        $crate::Computed::pure(move || { $($b)* })
    };
}
