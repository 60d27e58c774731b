use tensorobject_core::{DType, Device, Error, TensorObject};

fn arange_f32(n: usize, shape: &[usize], device: &Device) -> TensorObject {
    let data: Vec<f32> = (0..n).map(|x| x as f32).collect();
    TensorObject::from_vec(data, shape, device).unwrap()
}

macro_rules! test_for_device {
    ($dev:expr, $name:ident) => {
        mod $name {
            use super::*;

            fn device() -> Device {
                $dev
            }

            #[test]
            fn queries() {
                let t = arange_f32(24, &[2, 3, 4], &device());
                assert_eq!(t.rank(), 3);
                assert_eq!(t.count(), 24);
                assert_eq!(t.dtype(), DType::F32);
                assert_eq!(t.dtype_size(), 4);
                assert_eq!(t.bytes(), 96);
                assert_eq!(t.get_shape(), vec![2, 3, 4]);
                assert_eq!(t.get_stride(), vec![12, 4, 1]);
                assert_eq!(t.shape(1), 3);
                assert_eq!(t.stride(0), 12);
                assert_eq!(t.type_str(), "<f4");
                assert!(t.is_compact());
                assert_eq!(t.get_memory(), device());
            }

            #[test]
            fn slice_full_range_is_unchanged() {
                let t = arange_f32(12, &[3, 4], &device());
                let view = t.slice(&[0, 0], &[-1, -1]).unwrap();
                assert_eq!(view.get_shape(), t.get_shape());
                assert_eq!(view.get_stride(), t.get_stride());
                assert!(view.shares_storage(&t));
                assert_eq!(view.to_vec::<f32>().unwrap(), t.to_vec::<f32>().unwrap());
            }

            #[test]
            fn slice_negative_min_is_clamped() {
                let t = arange_f32(12, &[3, 4], &device());
                let view = t.slice(&[-5, 2], &[2, -1]).unwrap();
                assert_eq!(view.get_shape(), vec![2, 2]);
                assert_eq!(view.to_vec::<f32>().unwrap(), vec![2., 3., 6., 7.]);
            }

            #[test]
            fn slice_keeps_stride() {
                let t = arange_f32(20, &[4, 5], &device());
                let view = t.slice(&[1, 1], &[3, 3]).unwrap();
                assert_eq!(view.get_shape(), vec![2, 2]);
                assert_eq!(view.get_stride(), vec![5, 1]);
                assert!(!view.is_compact());
                assert_eq!(view.count(), 4);
                // Spans from (1, 1) to (2, 2) of the parent.
                assert_eq!(view.bytes(), 7 * 4);
                assert_eq!(view.to_vec::<f32>().unwrap(), vec![6., 7., 11., 12.]);
                assert_eq!(
                    view.to_host_vec::<f32>().unwrap(),
                    vec![6., 7., 8., 9., 10., 11., 12.]
                );
            }

            #[test]
            fn slice_of_slice() {
                let t = arange_f32(20, &[4, 5], &device());
                let view = t.slice(&[1, 1], &[4, 5]).unwrap();
                let inner = view.slice(&[1, 2], &[3, 4]).unwrap();
                assert_eq!(inner.to_vec::<f32>().unwrap(), vec![13., 14., 18., 19.]);
                assert_eq!(inner.read_element::<f32>(&[1, 0]).unwrap(), 18.);
            }

            #[test]
            fn slice_inverted_bounds() {
                let t = arange_f32(12, &[3, 4], &device());
                let err = t.slice(&[2, 0], &[1, -1]).unwrap_err();
                assert!(matches!(err.inner(), Error::Bounds(_)), "{err}");
            }

            #[test]
            fn slice_past_the_end() {
                let t = arange_f32(12, &[3, 4], &device());
                let err = t.slice(&[0, 0], &[3, 5]).unwrap_err();
                assert!(matches!(err.inner(), Error::Bounds(_)), "{err}");
            }

            #[test]
            #[should_panic(expected = "slice bounds of rank")]
            fn slice_wrong_rank() {
                let t = arange_f32(12, &[3, 4], &device());
                let _ = t.slice(&[0], &[1]);
            }

            #[test]
            fn reshape_compact_shares_storage() {
                let t = arange_f32(12, &[3, 4], &device());
                let r = t.reshape(&[2, 6]).unwrap();
                assert_eq!(r.get_shape(), vec![2, 6]);
                assert_eq!(r.get_stride(), vec![6, 1]);
                assert_eq!(r.count(), t.count());
                assert!(r.is_compact());
                assert!(r.shares_storage(&t));
                assert_eq!(r.read_element::<f32>(&[1, 0]).unwrap(), 6.);
            }

            #[test]
            fn reshape_non_compact_materializes() {
                let t = arange_f32(20, &[4, 5], &device());
                let view = t.slice(&[0, 1], &[4, 4]).unwrap();
                let r = view.reshape(&[3, 4]).unwrap();
                assert!(r.is_compact());
                assert_eq!(r.count(), 12);
                assert!(!r.shares_storage(&t));
                assert_eq!(
                    r.to_vec::<f32>().unwrap(),
                    vec![1., 2., 3., 6., 7., 8., 11., 12., 13., 16., 17., 18.]
                );
            }

            #[test]
            fn reshape_count_mismatch() {
                let t = arange_f32(12, &[3, 4], &device());
                let err = t.reshape(&[5, 2]).unwrap_err();
                assert!(matches!(err.inner(), Error::ShapeMismatch { .. }), "{err}");
            }

            #[test]
            fn reshape_to_rank0() {
                let t = TensorObject::from_vec(vec![7i32], &[1, 1], &device()).unwrap();
                let r = t.reshape(&[]).unwrap();
                assert_eq!(r.rank(), 0);
                assert_eq!(r.count(), 1);
                assert_eq!(r.read_element::<i32>(&[]).unwrap(), 7);
            }

            #[test]
            fn deep_copy_is_independent() {
                let t = arange_f32(6, &[2, 3], &device());
                let copy = t.deep_copy().unwrap();
                assert!(!copy.shares_storage(&t));
                assert_eq!(copy.get_stride(), vec![3, 1]);

                let zeros = TensorObject::zeros(&[2, 3], DType::F32, &device()).unwrap();
                t.copy_from(&zeros).unwrap();
                assert_eq!(t.to_vec::<f32>().unwrap(), vec![0.; 6]);
                assert_eq!(copy.to_vec::<f32>().unwrap(), vec![0., 1., 2., 3., 4., 5.]);
            }

            #[test]
            fn deep_copy_of_view_is_compact() {
                let t = arange_f32(24, &[2, 3, 4], &device());
                let view = t.slice(&[0, 1, 1], &[2, 3, 3]).unwrap();
                let copy = view.deep_copy().unwrap();
                assert_eq!(copy.get_shape(), vec![2, 2, 2]);
                assert_eq!(copy.get_stride(), vec![4, 2, 1]);
                assert!(copy.is_compact());
                assert_eq!(copy.bytes(), copy.count() * 4);
                assert_eq!(
                    copy.to_vec::<f32>().unwrap(),
                    vec![5., 6., 9., 10., 17., 18., 21., 22.]
                );
            }

            #[test]
            fn as_type_same_dtype_shares() {
                let t = arange_f32(6, &[2, 3], &device());
                let same = t.as_type(DType::F32).unwrap();
                assert!(same.shares_storage(&t));
                assert!(std::sync::Arc::ptr_eq(&same.get_tensor(), &t.get_tensor()));
            }

            #[test]
            fn as_type_converts() {
                let t = TensorObject::from_vec(vec![1.9f32, -2.5, 3.0, 250.0], &[2, 2], &device())
                    .unwrap();
                let ints = t.as_type(DType::I32).unwrap();
                assert_eq!(ints.dtype(), DType::I32);
                assert!(!ints.shares_storage(&t));
                assert_eq!(ints.to_vec::<i32>().unwrap(), vec![1, -2, 3, 250]);

                let wide = t.as_type(DType::F64).unwrap();
                assert_eq!(wide.to_vec::<f64>().unwrap(), vec![1.9f32 as f64, -2.5, 3.0, 250.0]);
            }

            #[test]
            fn as_type_of_view() {
                let t = TensorObject::from_vec((0..12).collect::<Vec<i64>>(), &[3, 4], &device())
                    .unwrap();
                let view = t.slice(&[1, 1], &[3, 3]).unwrap();
                let floats = view.as_type(DType::F64).unwrap();
                assert!(floats.is_compact());
                assert_eq!(floats.to_vec::<f64>().unwrap(), vec![5., 6., 9., 10.]);
            }

            #[test]
            fn as_type_non_finite_to_int() {
                let t = TensorObject::from_vec(vec![1.0f64, f64::NAN], &[2], &device()).unwrap();
                let err = t.as_type(DType::U8).unwrap_err();
                assert!(matches!(err.inner(), Error::Conversion { .. }), "{err}");
            }

            #[test]
            fn as_type_infinity_to_int() {
                let t = TensorObject::from_vec(vec![f32::INFINITY, 2.0], &[2], &device()).unwrap();
                let err = t.as_type(DType::I32).unwrap_err();
                assert!(matches!(err.inner(), Error::Conversion { .. }), "{err}");
                let t = TensorObject::from_vec(vec![f64::NEG_INFINITY], &[1], &device()).unwrap();
                assert!(t.as_type(DType::U64).is_err());
            }

            #[test]
            fn copy_rows_rank0() {
                let t = arange_f32(1, &[1], &device()).reshape(&[]).unwrap();
                assert_eq!(t.rank(), 0);
                let err = t.copy_rows(&[(0, 1)], 1).unwrap_err();
                assert!(matches!(err.inner(), Error::Bounds(_)), "{err}");
            }

            #[test]
            fn copy_rows_in_order() {
                let t = arange_f32(16, &[8, 2], &device());
                let rows = t.copy_rows(&[(0, 2), (5, 7)], 4).unwrap();
                assert_eq!(rows.get_shape(), vec![4, 2]);
                assert!(rows.is_compact());
                assert!(!rows.shares_storage(&t));
                assert_eq!(
                    rows.to_vec::<f32>().unwrap(),
                    vec![0., 1., 2., 3., 10., 11., 12., 13.]
                );
            }

            #[test]
            fn copy_rows_preserves_range_order() {
                let t = arange_f32(12, &[6, 2], &device());
                let rows = t.copy_rows(&[(4, 6), (0, 1), (3, 3)], 3).unwrap();
                assert_eq!(rows.to_vec::<f32>().unwrap(), vec![8., 9., 10., 11., 0., 1.]);
            }

            #[test]
            fn copy_rows_of_view() {
                let t = arange_f32(30, &[6, 5], &device());
                let view = t.slice(&[0, 1], &[-1, 3]).unwrap();
                assert!(!view.is_compact());
                let rows = view.copy_rows(&[(1, 2), (4, 6)], 3).unwrap();
                assert_eq!(rows.get_shape(), vec![3, 2]);
                assert_eq!(rows.to_vec::<f32>().unwrap(), vec![6., 7., 21., 22., 26., 27.]);
            }

            #[test]
            fn copy_rows_out_of_range() {
                let t = arange_f32(8, &[4, 2], &device());
                let err = t.copy_rows(&[(2, 5)], 3).unwrap_err();
                assert!(matches!(err.inner(), Error::Bounds(_)), "{err}");
            }

            #[test]
            fn copy_rows_inverted() {
                let t = arange_f32(8, &[4, 2], &device());
                let err = t.copy_rows(&[(3, 1)], 2).unwrap_err();
                assert!(matches!(err.inner(), Error::Bounds(_)), "{err}");
            }

            #[test]
            fn copy_rows_total_mismatch() {
                let t = arange_f32(8, &[4, 2], &device());
                let err = t.copy_rows(&[(0, 2)], 3).unwrap_err();
                assert!(matches!(err.inner(), Error::Bounds(_)), "{err}");
            }

            #[test]
            fn copy_assignment() {
                let src = arange_f32(6, &[2, 3], &device());
                let dst = TensorObject::zeros(&[2, 3], DType::F32, &device()).unwrap();
                let alias = dst.clone();
                dst.copy_from(&src).unwrap();
                assert_eq!(dst.to_vec::<f32>().unwrap(), src.to_vec::<f32>().unwrap());
                // Visible through every handle sharing the storage.
                assert_eq!(alias.read_element::<f32>(&[1, 2]).unwrap(), 5.);
            }

            #[test]
            fn copy_assignment_shape_mismatch() {
                let src = arange_f32(6, &[3, 2], &device());
                let dst = TensorObject::full(9f32, &[2, 3], &device()).unwrap();
                let err = dst.copy_from(&src).unwrap_err();
                assert!(matches!(err.inner(), Error::ShapeMismatch { .. }), "{err}");
                assert_eq!(dst.to_vec::<f32>().unwrap(), vec![9.; 6]);
            }

            #[test]
            fn copy_assignment_stride_mismatch() {
                let big = arange_f32(20, &[4, 5], &device());
                let src = big.slice(&[0, 0], &[2, 3]).unwrap();
                let dst = TensorObject::zeros(&[2, 3], DType::F32, &device()).unwrap();
                let err = dst.copy_from(&src).unwrap_err();
                assert!(matches!(err.inner(), Error::StrideMismatch { .. }), "{err}");
            }

            #[test]
            fn copy_assignment_dtype_mismatch() {
                let src = TensorObject::zeros(&[2, 3], DType::F64, &device()).unwrap();
                let dst = arange_f32(6, &[2, 3], &device());
                let err = dst.copy_from(&src).unwrap_err();
                assert!(matches!(err.inner(), Error::DTypeMismatch { .. }), "{err}");
                assert_eq!(dst.read_element::<f32>(&[0, 1]).unwrap(), 1.);
            }

            #[test]
            fn copy_assignment_between_views_leaves_gaps() {
                let src = arange_f32(20, &[4, 5], &device());
                let dst = TensorObject::zeros(&[4, 5], DType::F32, &device()).unwrap();
                let src_view = src.slice(&[1, 1], &[3, 3]).unwrap();
                let dst_view = dst.slice(&[1, 1], &[3, 3]).unwrap();
                dst_view.copy_from(&src_view).unwrap();

                let mut expected = vec![0f32; 20];
                for i in [6, 7, 11, 12] {
                    expected[i] = i as f32;
                }
                assert_eq!(dst.to_vec::<f32>().unwrap(), expected);
            }

            #[test]
            fn copy_assignment_within_one_block() {
                let t = arange_f32(8, &[4, 2], &device());
                let top = t.slice(&[0, 0], &[2, -1]).unwrap();
                let bottom = t.slice(&[2, 0], &[4, -1]).unwrap();
                top.copy_from(&bottom).unwrap();
                assert_eq!(t.to_vec::<f32>().unwrap(), vec![4., 5., 6., 7., 4., 5., 6., 7.]);
            }

            #[test]
            fn copy_assignment_between_overlapping_views() {
                let t = arange_f32(12, &[3, 4], &device());
                let src = t.slice(&[0, 0], &[2, 3]).unwrap();
                let dst = t.slice(&[1, 1], &[3, 4]).unwrap();
                let before = src.to_vec::<f32>().unwrap();
                dst.copy_from(&src).unwrap();
                assert_eq!(dst.to_vec::<f32>().unwrap(), before);
                assert_eq!(
                    t.to_vec::<f32>().unwrap(),
                    vec![0., 1., 2., 3., 4., 0., 1., 2., 8., 4., 5., 6.]
                );
            }

            #[test]
            fn move_assignment() {
                let mut src = arange_f32(6, &[2, 3], &device());
                let mut dst = TensorObject::default();
                assert!(dst.is_empty());
                dst.move_from(&mut src);
                assert!(src.is_empty());
                assert!(!dst.is_empty());
                assert_eq!(dst.read_element::<f32>(&[1, 1]).unwrap(), 4.);
            }

            #[test]
            #[should_panic(expected = "tensor handle is empty")]
            fn empty_handle_is_fatal() {
                let mut t = arange_f32(6, &[2, 3], &device());
                let _moved = t.take();
                let _ = t.rank();
            }

            #[test]
            fn read_element_in_bounds() {
                let t = arange_f32(6, &[2, 3], &device());
                assert_eq!(t.read_element::<f32>(&[1, 2]).unwrap(), 5.);
                assert_eq!(t.read_element::<f32>(&[0, 0]).unwrap(), 0.);
            }

            #[test]
            #[should_panic(expected = "outside of the bounds")]
            fn read_element_out_of_bounds() {
                let t = arange_f32(6, &[2, 3], &device());
                let _ = t.read_element::<f32>(&[2, 0]);
            }

            #[test]
            #[should_panic(expected = "must match rank")]
            fn read_element_wrong_rank() {
                let t = arange_f32(6, &[2, 3], &device());
                let _ = t.read_element::<f32>(&[1]);
            }

            #[test]
            #[should_panic(expected = "read_element type must match array type")]
            fn read_element_wrong_type() {
                let t = arange_f32(6, &[2, 3], &device());
                let _ = t.read_element::<f64>(&[0, 0]);
            }

            #[test]
            fn explicit_layout() {
                // Column-major 2x3 over six elements.
                let t = TensorObject::from_vec_strided(
                    vec![0u16, 1, 2, 3, 4, 5],
                    &[2, 3],
                    &[1, 2],
                    0,
                    &device(),
                )
                .unwrap();
                assert!(!t.is_compact());
                assert_eq!(t.to_vec::<u16>().unwrap(), vec![0, 2, 4, 1, 3, 5]);
            }

            #[test]
            fn explicit_layout_out_of_storage() {
                let err = TensorObject::from_vec_strided(
                    vec![0u8; 4],
                    &[2, 3],
                    &[],
                    0,
                    &device(),
                )
                .unwrap_err();
                assert!(matches!(err.inner(), Error::Bounds(_)), "{err}");
            }

            #[test]
            fn explicit_layout_overflowing_stride() {
                let err = TensorObject::from_vec_strided(
                    vec![0f32; 4],
                    &[2, 2],
                    &[isize::MAX, 1],
                    0,
                    &device(),
                )
                .unwrap_err();
                assert!(matches!(err.inner(), Error::Bounds(_)), "{err}");
                let err = TensorObject::from_vec_strided(
                    vec![0f32; 4],
                    &[2, 2],
                    &[],
                    usize::MAX,
                    &device(),
                )
                .unwrap_err();
                assert!(matches!(err.inner(), Error::Bounds(_)), "{err}");
            }
        }
    };
}

test_for_device!(Device::Cpu, cpu_tests);
#[cfg(feature = "cuda")]
test_for_device!(Device::cuda(0).unwrap(), cuda_tests);

#[test]
fn handle_records_memory_domain() {
    let t = arange_f32(4, &[4], &Device::Cpu);
    assert_eq!(t.get_memory(), Device::Cpu);
    assert_eq!(t.get_tensor().device(), Device::Cpu);
    assert_eq!(
        t.get_memory().storage_kind(),
        tensorobject_core::StorageKind::Host
    );
}
