/// Clears a buffer and refills it with `len` default values, reusing its allocation.
pub trait ZeroVec {
    fn zero_len(&mut self, len: usize);
}

impl<T: Default + Clone> ZeroVec for Vec<T> {
    fn zero_len(&mut self, len: usize) {
        self.clear();
        self.reserve(len);
        self.extend(std::iter::repeat_n(T::default(), len));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_len() {
        let mut v = vec![1.0, 2.0, 3.0];
        v.zero_len(2);
        assert_eq!(v, vec![0.0, 0.0]);

        let mut empty: Vec<f64> = Vec::new();
        empty.zero_len(4);
        assert_eq!(empty.len(), 4);
    }
}
