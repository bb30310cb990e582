// (c) Roel Kluin, 2023, GPL v3

/// Trace only in debug builds, with the location of the call.
#[macro_export]
macro_rules! dbg_print {
	($fmt:literal$(, $opt:expr)*) => ({
		if cfg!(debug_assertions) {
			log::trace!(concat!("[{}:{}] ", $fmt), file!(), line!()$(, $opt)*);
		}
	})
}

#[macro_export]
macro_rules! dbg_assert {
	($cond:expr) => ({
		if cfg!(debug_assertions) && !$cond {
			panic!("[{}:{}] assertion failed: {}", file!(), line!(), stringify!($cond));
		}
	});
	($cond:expr, $fmt:literal$(, $opt:expr)*) => ({
		if cfg!(debug_assertions) && !$cond {
			panic!(concat!("[{}:{}] ", $fmt), file!(), line!()$(, $opt)*);
		}
	})
}

#[macro_export]
macro_rules! dbg_assert_eq {
	($left:expr, $right:expr) => ({
		if cfg!(debug_assertions) {
			match (&$left, &$right) {
				(l, r) => {
					if *l != *r {
						panic!("[{}:{}] {} != {}: {:?} vs {:?}", file!(), line!(),
							stringify!($left), stringify!($right), l, r);
					}
				}
			}
		}
	})
}

/// Evaluates to the expression, printing it in debug builds.
#[macro_export]
macro_rules! dbgf {
	($expr:expr, $fmt:literal$(, $opt:expr)*) => {
		match $expr {
			expr => {
				if cfg!(debug_assertions) {
					log::trace!(concat!("[{}:{}] {} = ", $fmt), file!(), line!(), stringify!($expr), &expr$(, $opt)*);
				}
				expr
			}
		}
	}
}
