pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use dashmap::DashMap;
pub use derivative::Derivative;
pub use getset::{CopyGetters, Getters};
pub use indexmap::{IndexMap, IndexSet};
pub use itertools::{izip, Itertools as _};
pub use log::{debug, info, warn};
pub use ndarray::{s, Array1, Array2, Array3, ArrayD, ArrayView3, Axis, Ix3, IxDyn, Zip};
pub use noisy_float::prelude::*;
pub use rand::{prelude::*, rngs::StdRng};
pub use rand_distr::{Beta, Normal};
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Cow,
    fmt::{self, Debug},
    iter,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

unzip_n::unzip_n!(pub 3);
